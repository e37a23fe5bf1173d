use quarry_error::Result;

use super::plan_select::SelectPlanner;
use super::plan_setop::SetOpPlanner;
use crate::compile::CompileContext;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::BoundQuery;
use crate::logical::binder::bind_query::bind_modifier::{BoundModifiers, literal_count};
use crate::logical::logical_expression_list::LogicalExpressionList;
use crate::logical::logical_limit::{LogicalLimit, LogicalSample};
use crate::logical::logical_order::LogicalOrder;
use crate::logical::operator::{Cardinality, LogicalOperator, Node};

#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> QueryPlanner<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        QueryPlanner { ctx }
    }

    pub fn plan(&self, bind_context: &mut BindContext, query: BoundQuery) -> Result<LogicalOperator> {
        match query {
            BoundQuery::Select(select) => SelectPlanner::new(self.ctx).plan(bind_context, select),
            BoundQuery::SetOp(setop) => SetOpPlanner::new(self.ctx).plan(bind_context, setop),
            BoundQuery::Values(values) => {
                let table = bind_context.get_table(values.expressions_table)?;
                let cardinality = if values.rows.len() == 1 {
                    Cardinality::AtMostOne
                } else {
                    Cardinality::MultiRow
                };

                Ok(LogicalOperator::ExpressionList(
                    Node::leaf(LogicalExpressionList {
                        table_ref: values.expressions_table,
                        types: table.column_types.clone(),
                        rows: values.rows,
                    })
                    .with_cardinality(cardinality),
                ))
            }
            BoundQuery::Modified { inner, modifiers } => {
                let plan = self.plan(bind_context, *inner)?;
                Ok(plan_modifiers(plan, modifiers))
            }
        }
    }
}

/// Wrap a plan with ORDER BY, SAMPLE, and LIMIT/OFFSET, in that order.
pub(crate) fn plan_modifiers(mut plan: LogicalOperator, modifiers: BoundModifiers) -> LogicalOperator {
    if let Some(order_by) = modifiers.order_by {
        let cardinality = plan.cardinality();
        plan = LogicalOperator::Order(
            Node::new(LogicalOrder { exprs: order_by.exprs }, vec![plan]).with_cardinality(cardinality),
        );
    }

    if let Some(limit) = modifiers.limit {
        if let Some(amount) = limit.sample {
            plan = LogicalOperator::Sample(Node::new(
                LogicalSample {
                    amount,
                    seed: limit.seed,
                },
                vec![plan],
            ));
        }

        if limit.limit.is_some() || limit.offset.is_some() {
            let cardinality = match limit.limit.as_ref().and_then(literal_count) {
                Some(0) => Cardinality::NoRows,
                Some(1) => Cardinality::AtMostOne,
                _ => plan.cardinality(),
            };
            plan = LogicalOperator::Limit(
                Node::new(
                    LogicalLimit {
                        limit: limit.limit,
                        offset: limit.offset,
                    },
                    vec![plan],
                )
                .with_cardinality(cardinality),
            );
        }
    }

    plan
}
