use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::types::datatype::DataType;

/// Scan of a base table from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalScan {
    /// Table reference representing output of this scan.
    pub table_ref: TableRef,
    pub schema: String,
    pub table: String,
    /// All columns of the table, including the hidden row id as the last
    /// column.
    pub column_names: Vec<String>,
    pub column_types: Vec<DataType>,
    /// Column indexes actually read, ascending.
    ///
    /// Columns keep their table position, the projection only tells the
    /// storage layer which ones can be skipped.
    pub projection: Vec<usize>,
}

impl Explainable for LogicalScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let projected: Vec<_> = self
            .projection
            .iter()
            .filter_map(|idx| self.column_names.get(*idx))
            .collect();

        EntryBuilder::new("Scan", conf)
            .with_value("source", format!("{}.{}", self.schema, self.table))
            .with_values("columns", projected)
            .with_value_if_verbose("table_ref", self.table_ref)
            .with_values_if_verbose("column_types", &self.column_types)
            .build()
    }
}

impl LogicalNode for Node<LogicalScan> {
    fn name(&self) -> &'static str {
        "Scan"
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
