use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::functions::PlannedFunction;

/// A function producing a table, used in FROM.
///
/// Arguments may reference columns from the left side of a LATERAL join.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalTableFunction {
    pub table_ref: TableRef,
    pub function: PlannedFunction,
}

impl Explainable for LogicalTableFunction {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("TableFunction", conf)
            .with_value("function", self.function.name)
            .with_contextual_values("arguments", &self.function.inputs)
            .with_value_if_verbose("table_ref", self.table_ref)
            .build()
    }
}

impl LogicalNode for Node<LogicalTableFunction> {
    fn name(&self) -> &'static str {
        "TableFunction"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        vec![self.node.table_ref]
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for input in &self.node.function.inputs {
            func(input)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for input in &mut self.node.function.inputs {
            func(input)?;
        }
        Ok(())
    }
}
