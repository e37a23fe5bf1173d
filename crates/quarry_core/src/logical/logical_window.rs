use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Evaluates window functions over the child rows.
///
/// Rows pass through unchanged, each gaining one column per window in
/// `windows_table`. Every entry in `windows` is an `Expression::Window`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalWindow {
    pub windows: Vec<Expression>,
    pub windows_table: TableRef,
}

impl LogicalWindow {
    /// Short description of how each window splits and walks its rows,
    /// e.g. "ROWS partitions=1 order=2".
    pub fn window_shapes(&self) -> Vec<String> {
        self.windows
            .iter()
            .map(|expr| match expr {
                Expression::Window(window) => format!(
                    "{} partitions={} order={}",
                    window.frame.unit,
                    window.partition_by.len(),
                    window.order_by.len()
                ),
                _ => "?".to_string(),
            })
            .collect()
    }
}

impl Explainable for LogicalWindow {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Window", conf)
            .with_contextual_values("windows", &self.windows)
            .with_values_if_verbose("shapes", self.window_shapes())
            .with_value_if_verbose("table_ref", self.windows_table)
            .build()
    }
}

impl LogicalNode for Node<LogicalWindow> {
    fn name(&self) -> &'static str {
        "Window"
    }

    /// Child tables first, then the window outputs.
    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        let mut refs = self.get_children_table_refs(bind_context);
        refs.push(self.node.windows_table);
        refs
    }

    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        self.node.windows.iter().try_for_each(func)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        self.node.windows.iter_mut().try_for_each(func)
    }
}
