use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::functions::PlannedFunction;

/// Invoke a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalCall {
    pub schema: String,
    pub procedure: PlannedFunction,
}

impl Explainable for LogicalCall {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Call", conf)
            .with_value("procedure", format!("{}.{}", self.schema, self.procedure.name))
            .with_contextual_values("arguments", &self.procedure.inputs)
            .build()
    }
}

impl LogicalNode for Node<LogicalCall> {
    fn name(&self) -> &'static str {
        "Call"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        Vec::new()
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for input in &self.node.procedure.inputs {
            func(input)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for input in &mut self.node.procedure.inputs {
            func(input)?;
        }
        Ok(())
    }
}
