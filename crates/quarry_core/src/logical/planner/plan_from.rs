use quarry_error::Result;
use tracing::trace;

use super::filter_pushdown::{JoinConditionExtractor, filter_above, plan_join_from_conditions};
use crate::catalog::entry::TableEntry;
use crate::expr::Expression;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, TableRef};
use crate::logical::binder::bind_query::bind_from::{BoundFrom, BoundFromItem, BoundJoin, BoundSubquery};
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::logical_table_function::LogicalTableFunction;
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, NodeFlags};

#[derive(Debug, Clone, Copy)]
pub struct FromPlanner;

impl FromPlanner {
    pub fn plan(&self, bind_context: &BindContext, from: BoundFrom) -> Result<LogicalOperator> {
        match from.item {
            BoundFromItem::BaseTable(table) => Ok(plan_scan(table.table_ref, &table.schema, &table.entry)),
            BoundFromItem::TableFunction(func) => Ok(LogicalOperator::TableFunction(Node::leaf(
                LogicalTableFunction {
                    table_ref: func.table_ref,
                    function: func.function,
                },
            ))),
            BoundFromItem::Subquery(subquery) => plan_subquery(bind_context, subquery),
            BoundFromItem::Join(join) => self.plan_join(bind_context, join),
            BoundFromItem::Empty => Ok(LogicalOperator::SINGLE_ROW),
        }
    }

    fn plan_join(&self, bind_context: &BindContext, join: BoundJoin) -> Result<LogicalOperator> {
        let left = self.plan(bind_context, *join.left)?;
        let right = self.plan(bind_context, *join.right)?;

        let left_tables = left.get_output_table_refs(bind_context);
        let right_tables = right.get_output_table_refs(bind_context);

        let extracted =
            JoinConditionExtractor::new(&left_tables, &right_tables, join.join_type).extract(join.conditions)?;

        let left = filter_above(left, extracted.left_filter)?;
        let right = filter_above(right, extracted.right_filter)?;

        let flags = NodeFlags {
            dependent: join.lateral,
            ..Default::default()
        };

        trace!(
            join_type = %join.join_type,
            comparisons = extracted.comparisons.len(),
            arbitrary = extracted.arbitrary.len(),
            lateral = join.lateral,
            "planned join"
        );

        plan_join_from_conditions(
            bind_context,
            join.join_type,
            extracted.comparisons,
            extracted.arbitrary,
            left,
            right,
            flags,
        )
    }
}

/// Scan reading every column of the table. Unreferenced columns are
/// pruned once the whole query is planned.
pub fn plan_scan(table_ref: TableRef, schema: &str, entry: &TableEntry) -> LogicalOperator {
    let column_names: Vec<_> = entry.columns.iter().map(|c| c.name.clone()).collect();
    let column_types = entry.columns.iter().map(|c| c.datatype.clone()).collect();
    let projection = (0..column_names.len()).collect();

    LogicalOperator::Scan(Node::leaf(LogicalScan {
        table_ref,
        schema: schema.to_string(),
        table: entry.name.clone(),
        column_names,
        column_types,
        projection,
    }))
}

/// Project the output of a subquery, CTE, or view into the table the FROM
/// clause exposes it as.
fn plan_subquery(bind_context: &BindContext, subquery: BoundSubquery) -> Result<LogicalOperator> {
    let source = bind_context.get_table(subquery.source)?;
    let projections = source
        .column_types
        .iter()
        .enumerate()
        .map(|(idx, datatype)| {
            Expression::Column(ColumnExpr::new(
                ColumnReference::new(subquery.source, idx),
                datatype.clone(),
            ))
        })
        .collect();

    let cardinality = subquery.plan.cardinality();
    Ok(LogicalOperator::Project(
        Node::new(
            LogicalProject {
                projections,
                projection_table: subquery.table_ref,
            },
            vec![subquery.plan],
        )
        .with_cardinality(cardinality),
    ))
}

/// Flag scans and joins producing a table that an inner query references.
pub fn mark_outer_referenced(bind_context: &BindContext, plan: &mut LogicalOperator) -> Result<()> {
    plan.walk_mut(&mut |op| {
        if matches!(
            op,
            LogicalOperator::Scan(_)
                | LogicalOperator::TableFunction(_)
                | LogicalOperator::CrossJoin(_)
                | LogicalOperator::ComparisonJoin(_)
                | LogicalOperator::ArbitraryJoin(_)
        ) {
            let mut referenced = false;
            for table in op.get_output_table_refs(bind_context) {
                if bind_context.get_table(table)?.outer_referenced {
                    referenced = true;
                    break;
                }
            }
            if referenced {
                op.flags_mut().outer_referenced = true;
            }
        }
        Ok(())
    })
}
