use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// LIMIT and OFFSET. Both are constant Int64 expressions (literals or
/// parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLimit {
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

impl Explainable for LogicalLimit {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Limit", conf);
        if let Some(limit) = &self.limit {
            builder = builder.with_contextual_value("limit", limit);
        }
        if let Some(offset) = &self.offset {
            builder = builder.with_contextual_value("offset", offset);
        }
        builder.build()
    }
}

impl LogicalNode for Node<LogicalLimit> {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.get_children_table_refs(bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        if let Some(limit) = &self.node.limit {
            func(limit)?;
        }
        if let Some(offset) = &self.node.offset {
            func(offset)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        if let Some(limit) = &mut self.node.limit {
            func(limit)?;
        }
        if let Some(offset) = &mut self.node.offset {
            func(offset)?;
        }
        Ok(())
    }
}

/// How many rows a SAMPLE keeps.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleAmount {
    /// Fixed number of rows, Int64.
    Rows(Expression),
    /// Fraction of the input between 0 and 1.
    Fraction(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalSample {
    pub amount: SampleAmount,
    pub seed: Option<i64>,
}

impl Explainable for LogicalSample {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Sample", conf);
        builder = match &self.amount {
            SampleAmount::Rows(rows) => builder.with_contextual_value("rows", rows),
            SampleAmount::Fraction(frac) => builder.with_value("fraction", frac),
        };
        if let Some(seed) = self.seed {
            builder = builder.with_value("seed", seed);
        }
        builder.build()
    }
}

impl LogicalNode for Node<LogicalSample> {
    fn name(&self) -> &'static str {
        "Sample"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.get_children_table_refs(bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        if let SampleAmount::Rows(rows) = &self.node.amount {
            func(rows)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        if let SampleAmount::Rows(rows) = &mut self.node.amount {
            func(rows)?;
        }
        Ok(())
    }
}
