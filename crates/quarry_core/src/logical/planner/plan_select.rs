use quarry_error::Result;
use tracing::trace;

use super::filter_pushdown::{FilterPushdown, filter_above};
use super::plan_from::{FromPlanner, mark_outer_referenced};
use super::plan_query::plan_modifiers;
use crate::compile::CompileContext;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::bind_select::BoundSelect;
use crate::logical::logical_aggregate::LogicalAggregate;
use crate::logical::logical_distinct::LogicalDistinct;
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_window::LogicalWindow;
use crate::logical::operator::{Cardinality, LogicalOperator, Node, NodeFlags};

#[derive(Debug, Clone, Copy)]
pub struct SelectPlanner<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> SelectPlanner<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        SelectPlanner { ctx }
    }

    pub fn plan(&self, bind_context: &mut BindContext, select: BoundSelect) -> Result<LogicalOperator> {
        let BoundSelect {
            from,
            filter,
            group_by,
            having,
            select_list,
            modifiers,
            distinct,
        } = select;

        // FROM and WHERE
        let mut plan = FromPlanner.plan(bind_context, from)?;
        if let Some(filter) = filter {
            plan = FilterPushdown::new(bind_context).push(plan, filter.split_conjunction())?;
        }
        mark_outer_referenced(bind_context, &mut plan)?;

        // GROUP BY and aggregates
        if !select_list.aggregates.is_empty() || group_by.is_some() {
            let (group_exprs, group_table, grouping_sets) = match group_by {
                Some(group_by) => (
                    group_by.expressions,
                    Some(group_by.group_table),
                    group_by.grouping_sets,
                ),
                None => (Vec::new(), None, None),
            };

            // Without GROUP BY there's exactly one output row.
            let cardinality = if group_table.is_none() {
                Cardinality::AtMostOne
            } else {
                Cardinality::Aggregated
            };

            trace!(
                groups = group_exprs.len(),
                aggregates = select_list.aggregates.len(),
                grouping_sets = grouping_sets.as_ref().map(|s| s.len()),
                "planning aggregate"
            );

            plan = LogicalOperator::Aggregate(
                Node::new(
                    LogicalAggregate {
                        aggregates_table: select_list.aggregates_table,
                        aggregates: select_list.aggregates,
                        group_table,
                        group_exprs,
                        grouping_sets,
                    },
                    vec![plan],
                )
                .with_cardinality(cardinality)
                .with_flags(NodeFlags {
                    single_row: cardinality == Cardinality::AtMostOne,
                    ..Default::default()
                }),
            );
        }

        // HAVING
        if let Some(having) = having {
            let cardinality = plan.cardinality();
            plan = filter_above(plan, vec![having])?;
            plan.set_cardinality(cardinality);
        }

        // Windows
        if !select_list.windows.is_empty() {
            let cardinality = plan.cardinality();
            plan = LogicalOperator::Window(
                Node::new(
                    LogicalWindow {
                        windows: select_list.windows,
                        windows_table: select_list.windows_table,
                    },
                    vec![plan],
                )
                .with_cardinality(cardinality),
            );
        }

        // Projections, including columns appended for ORDER BY.
        let cardinality = plan.cardinality();
        plan = LogicalOperator::Project(
            Node::new(
                LogicalProject {
                    projections: select_list.projections,
                    projection_table: select_list.projections_table,
                },
                vec![plan],
            )
            .with_cardinality(cardinality),
        );

        if distinct {
            let cardinality = plan.cardinality();
            plan = LogicalOperator::Distinct(
                Node::new(LogicalDistinct, vec![plan])
                    .with_cardinality(cardinality)
                    .with_flags(NodeFlags {
                        distinct: true,
                        ..Default::default()
                    }),
            );
        }

        // ORDER BY, SAMPLE, LIMIT
        plan = plan_modifiers(plan, modifiers);

        // Drop appended columns from the output.
        if let Some(output) = select_list.output {
            let cardinality = plan.cardinality();
            plan = LogicalOperator::Project(
                Node::new(
                    LogicalProject {
                        projections: output.expressions,
                        projection_table: output.table,
                    },
                    vec![plan],
                )
                .with_cardinality(cardinality),
            );
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::ast;

    use super::*;
    use crate::logical::binder::bind_query::plan_query;
    use crate::logical::operator::LogicalNode;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn fixture() -> Fixture {
        Fixture::new()
            .with_table("t1", &[("x", DataType::Int32), ("y", DataType::Int32)])
            .with_table("t2", &[("x", DataType::Int32), ("z", DataType::Int32)])
    }

    fn plan(fixture: &Fixture, query: ast::QueryNode) -> (BindContext, LogicalOperator) {
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        let plan = plan_query(&ctx, &mut bind_context, scope, &query).unwrap();
        (bind_context, plan)
    }

    fn names(plan: &LogicalOperator) -> Vec<&'static str> {
        let mut names = Vec::new();
        plan.walk(&mut |op| {
            names.push(op.name());
            Ok(())
        })
        .unwrap();
        names
    }

    #[test]
    fn no_from_uses_single_row() {
        let query = ast::QueryNode::select(ast::SelectNode::new(vec![ast::SelectExpr::Expr(
            ast::Expr::number(1),
        )]));
        let (_, plan) = plan(&fixture(), query);
        assert_eq!(vec!["Project", "SingleRow"], names(&plan));
    }

    #[test]
    fn where_pushed_into_cross_join() {
        let select = ast::SelectNode::new(vec![ast::SelectExpr::Wildcard])
            .from(ast::FromNode::table("t1").join(
                ast::FromNode::table("t2"),
                ast::JoinType::Cross,
                ast::JoinCondition::None,
            ))
            .filter(ast::Expr::and(
                ast::Expr::eq(ast::Expr::compound(&["t1", "x"]), ast::Expr::compound(&["t2", "x"])),
                ast::Expr::eq(ast::Expr::ident("y"), ast::Expr::number(3)),
            ));

        let (_, plan) = plan(&fixture(), ast::QueryNode::select(select));
        assert_eq!(
            vec!["Project", "ComparisonJoin", "Filter", "Scan", "Scan"],
            names(&plan)
        );
    }

    #[test]
    fn order_by_hidden_column_pruned() {
        let select = ast::SelectNode::new(vec![ast::SelectExpr::Expr(ast::Expr::ident("x"))])
            .from(ast::FromNode::table("t1"));
        let query = ast::QueryNode::select(select).with_order_by(vec![ast::OrderByNode {
            typ: None,
            nulls: None,
            expr: ast::Expr::ident("y"),
        }]);

        let (bind_context, plan) = plan(&fixture(), query);
        assert_eq!(vec!["Project", "Order", "Project", "Scan"], names(&plan));

        let output = plan.get_output_table_refs(&bind_context);
        let table = bind_context.get_table(output[0]).unwrap();
        assert_eq!(vec!["x".to_string()], table.column_names);
    }

    #[test]
    fn aggregate_without_group_by_is_single_row() {
        let select = ast::SelectNode::new(vec![ast::SelectExpr::Expr(ast::Expr::count_star())])
            .from(ast::FromNode::table("t1"));
        let (_, plan) = plan(&fixture(), ast::QueryNode::select(select));

        let agg = &plan.children()[0];
        assert_eq!("Aggregate", agg.name());
        assert_eq!(Cardinality::AtMostOne, agg.cardinality());
        assert!(agg.flags().single_row);
    }
}
