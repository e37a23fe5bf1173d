use std::collections::BTreeSet;

use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Group rows and compute aggregates per group.
///
/// The output is the group columns (if any) followed by the aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalAggregate {
    /// Table containing the aggregate results.
    pub aggregates_table: TableRef,
    pub aggregates: Vec<Expression>,
    /// Table containing the grouped columns. None when there's no GROUP BY.
    pub group_table: Option<TableRef>,
    pub group_exprs: Vec<Expression>,
    /// Grouping sets as indices into `group_exprs`.
    ///
    /// None when grouping by all group expressions at once.
    pub grouping_sets: Option<Vec<BTreeSet<usize>>>,
}

impl Explainable for LogicalAggregate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Aggregate", conf)
            .with_contextual_values("aggregates", &self.aggregates)
            .with_value_if_verbose("aggregates_table_ref", self.aggregates_table);

        if let Some(group_table) = self.group_table {
            builder = builder
                .with_contextual_values("group_expressions", &self.group_exprs)
                .with_value_if_verbose("group_table_ref", group_table);
        }

        if let Some(sets) = &self.grouping_sets {
            let sets = sets.iter().map(|set| {
                let cols: Vec<_> = set.iter().map(|c| c.to_string()).collect();
                format!("({})", cols.join(", "))
            });
            builder = builder.with_values("grouping_sets", sets);
        }

        builder.build()
    }
}

impl LogicalNode for Node<LogicalAggregate> {
    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        match self.node.group_table {
            Some(group_table) => vec![group_table, self.node.aggregates_table],
            None => vec![self.node.aggregates_table],
        }
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for expr in &self.node.group_exprs {
            func(expr)?;
        }
        for expr in &self.node.aggregates {
            func(expr)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for expr in &mut self.node.group_exprs {
            func(expr)?;
        }
        for expr in &mut self.node.aggregates {
            func(expr)?;
        }
        Ok(())
    }
}
