//! Narrows scans down to the columns the plan reads.
use std::collections::{BTreeSet, HashMap};

use quarry_error::Result;

use crate::expr::Expression;
use crate::logical::binder::bind_context::TableRef;
use crate::logical::operator::{LogicalNode, LogicalOperator};

/// Sets each scan's projection to the columns referenced anywhere in the
/// plan, including from correlated subqueries.
#[derive(Debug, Default)]
pub struct ColumnPruner {
    referenced: HashMap<TableRef, BTreeSet<usize>>,
}

impl ColumnPruner {
    pub fn prune(mut self, plan: &mut LogicalOperator) -> Result<()> {
        self.collect_plan(plan)?;

        let referenced = self.referenced;
        plan.walk_mut(&mut |op| {
            if let LogicalOperator::Scan(scan) = op {
                scan.node.projection = referenced
                    .get(&scan.node.table_ref)
                    .map(|cols| cols.iter().copied().collect())
                    .unwrap_or_default();
            }
            Ok(())
        })
    }

    fn collect_plan(&mut self, plan: &LogicalOperator) -> Result<()> {
        plan.walk(&mut |op| op.for_each_expr(|expr| self.collect_expr(expr)))
    }

    fn collect_expr(&mut self, expr: &Expression) -> Result<()> {
        match expr {
            Expression::Column(col) => {
                self.referenced
                    .entry(col.reference.table_scope)
                    .or_default()
                    .insert(col.reference.column);
            }
            Expression::Subquery(subquery) => self.collect_plan(&subquery.subquery)?,
            _ => (),
        }
        expr.for_each_child(&mut |child| self.collect_expr(child))
    }
}
