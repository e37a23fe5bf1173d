use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::explain::node::ExplainFormat;
use crate::expr::Expression;

/// Explain the plan of the only child.
///
/// Outputs two text columns, the plan type and the rendered plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExplain {
    pub analyze: bool,
    pub verbose: bool,
    pub format: ExplainFormat,
    /// Rendering of the child plan, produced at compile time.
    pub rendered: String,
    pub table_ref: TableRef,
}

impl Explainable for LogicalExplain {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Explain", conf)
            .with_value("analyze", self.analyze)
            .with_value("verbose", self.verbose)
            .with_value_if_verbose("table_ref", self.table_ref)
            .build()
    }
}

impl LogicalNode for Node<LogicalExplain> {
    fn name(&self) -> &'static str {
        "Explain"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        vec![self.node.table_ref]
    }

    fn for_each_expr<'a, F>(&'a self, _func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        Ok(())
    }
}
