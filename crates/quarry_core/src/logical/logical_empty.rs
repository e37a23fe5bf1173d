use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node, impl_no_output_node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Produces a single row with no columns.
///
/// Used as the input for queries without a FROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalSingleRow;

impl Explainable for LogicalSingleRow {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("SingleRow")
    }
}

impl_no_output_node!(LogicalSingleRow, "SingleRow");

/// Produces no rows, while still exposing the table refs of the plan it
/// replaced so parents remain valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalNoRows {
    pub table_refs: Vec<TableRef>,
}

impl Explainable for LogicalNoRows {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("NoRows", conf)
            .with_values_if_verbose("table_refs", &self.table_refs)
            .build()
    }
}

impl LogicalNode for Node<LogicalNoRows> {
    fn name(&self) -> &'static str {
        "NoRows"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        self.node.table_refs.clone()
    }

    fn for_each_expr<'a, F>(&'a self, _func: F) -> quarry_error::Result<()>
    where
        F: FnMut(&'a Expression) -> quarry_error::Result<()>,
    {
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> quarry_error::Result<()>
    where
        F: FnMut(&'a mut Expression) -> quarry_error::Result<()>,
    {
        Ok(())
    }
}
