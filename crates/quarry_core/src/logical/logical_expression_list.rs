use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::context_display::ContextDisplayWrapper;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::types::datatype::DataType;

/// Rows of expressions, from VALUES.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpressionList {
    pub table_ref: TableRef,
    pub types: Vec<DataType>,
    /// Every row has one expression per type, already cast to it.
    pub rows: Vec<Vec<Expression>>,
}

impl Explainable for LogicalExpressionList {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("ExpressionList", conf)
            .with_values("datatypes", &self.types)
            .with_value_if_verbose("table_ref", self.table_ref);

        if conf.verbose {
            for (idx, row) in self.rows.iter().enumerate() {
                let row: Vec<_> = row
                    .iter()
                    .map(|e| ContextDisplayWrapper::with_mode(e, conf.context_mode).to_string())
                    .collect();
                builder = builder.with_values(format!("row{idx}"), row);
            }
        } else {
            builder = builder.with_value("num_rows", self.rows.len());
        }

        builder.build()
    }
}

impl LogicalNode for Node<LogicalExpressionList> {
    fn name(&self) -> &'static str {
        "ExpressionList"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        vec![self.node.table_ref]
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for row in &self.node.rows {
            for expr in row {
                func(expr)?;
            }
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for row in &mut self.node.rows {
            for expr in row {
                func(expr)?;
            }
        }
        Ok(())
    }
}
