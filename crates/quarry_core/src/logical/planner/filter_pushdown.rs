//! Places WHERE and ON predicates as close to the scans as join semantics
//! allow.
use std::collections::BTreeSet;

use quarry_error::Result;
use tracing::trace;

use crate::expr::{self, Expression};
use crate::logical::binder::bind_context::{BindContext, TableRef};
use crate::logical::logical_filter::LogicalFilter;
use crate::logical::logical_join::{
    JoinCondition,
    JoinType,
    LogicalArbitraryJoin,
    LogicalComparisonJoin,
    LogicalCrossJoin,
};
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, NodeFlags};

/// Which inputs of a join an expression reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprJoinSide {
    Left,
    Right,
    Both,
    /// Constants, outer references only, or expressions containing
    /// subqueries.
    None,
}

impl ExprJoinSide {
    pub fn of(expr: &Expression, left: &[TableRef], right: &[TableRef]) -> Self {
        if expr.contains_subquery() {
            return ExprJoinSide::None;
        }
        Self::from_tables(&expr.get_table_references(), left, right)
    }

    fn from_tables(tables: &BTreeSet<TableRef>, left: &[TableRef], right: &[TableRef]) -> Self {
        let mut side = ExprJoinSide::None;
        for table in tables {
            let this = if left.contains(table) {
                ExprJoinSide::Left
            } else if right.contains(table) {
                ExprJoinSide::Right
            } else {
                // Table from somewhere else entirely. Can't place it.
                return ExprJoinSide::Both;
            };
            side = match (side, this) {
                (ExprJoinSide::None, this) => this,
                (a, b) if a == b => a,
                _ => ExprJoinSide::Both,
            };
        }
        side
    }
}

/// Predicates of a join split by where they can be evaluated.
#[derive(Debug, Default)]
pub struct ExtractedConditions {
    /// Filters applied to the left input before joining.
    pub left_filter: Vec<Expression>,
    pub right_filter: Vec<Expression>,
    /// Comparisons with one side on each input.
    pub comparisons: Vec<JoinCondition>,
    /// Everything else, evaluated as part of the join predicate.
    pub arbitrary: Vec<Expression>,
}

/// Splits ON conditions of a join.
///
/// Conditions only reading one input are moved below the join when that
/// doesn't change which rows get NULL padded.
#[derive(Debug)]
pub struct JoinConditionExtractor<'a> {
    pub left_tables: &'a [TableRef],
    pub right_tables: &'a [TableRef],
    pub join_type: JoinType,
}

impl<'a> JoinConditionExtractor<'a> {
    pub fn new(left_tables: &'a [TableRef], right_tables: &'a [TableRef], join_type: JoinType) -> Self {
        JoinConditionExtractor {
            left_tables,
            right_tables,
            join_type,
        }
    }

    pub fn extract(&self, conditions: Vec<Expression>) -> Result<ExtractedConditions> {
        let mut extracted = ExtractedConditions::default();

        let conjuncts = conditions.into_iter().flat_map(|c| c.split_conjunction());
        for expr in conjuncts {
            match ExprJoinSide::of(&expr, self.left_tables, self.right_tables) {
                ExprJoinSide::Left if self.can_filter_left() => extracted.left_filter.push(expr),
                ExprJoinSide::Right if self.can_filter_right() => extracted.right_filter.push(expr),
                ExprJoinSide::Both => match self.try_comparison(expr) {
                    Ok(condition) => extracted.comparisons.push(condition),
                    Err(expr) => extracted.arbitrary.push(expr),
                },
                _ => extracted.arbitrary.push(expr),
            }
        }

        Ok(extracted)
    }

    /// ON predicates on the left input may only be pushed when the left side
    /// isn't preserved.
    fn can_filter_left(&self) -> bool {
        matches!(self.join_type, JoinType::Inner | JoinType::Right)
    }

    fn can_filter_right(&self) -> bool {
        matches!(
            self.join_type,
            JoinType::Inner | JoinType::Left | JoinType::Semi | JoinType::Anti
        )
    }

    /// Turn `expr` into a join condition if it's a comparison between the two
    /// inputs, otherwise hand it back.
    fn try_comparison(&self, expr: Expression) -> Result<JoinCondition, Expression> {
        let cmp = match expr {
            Expression::Comparison(cmp) => cmp,
            other => return Err(other),
        };

        let left_side = ExprJoinSide::of(&cmp.left, self.left_tables, self.right_tables);
        let right_side = ExprJoinSide::of(&cmp.right, self.left_tables, self.right_tables);

        match (left_side, right_side) {
            (ExprJoinSide::Left, ExprJoinSide::Right) => Ok(cmp.into()),
            (ExprJoinSide::Right, ExprJoinSide::Left) => {
                let mut condition: JoinCondition = cmp.into();
                condition.flip_sides();
                Ok(condition)
            }
            _ => Err(Expression::Comparison(cmp)),
        }
    }
}

/// Build the join node for already extracted conditions.
///
/// Without comparisons, or when an outer join has predicates that aren't
/// comparisons, the join is an arbitrary join. An inner join without any
/// predicate is a cross join.
pub fn plan_join_from_conditions(
    bind_context: &BindContext,
    join_type: JoinType,
    comparisons: Vec<JoinCondition>,
    arbitrary: Vec<Expression>,
    left: LogicalOperator,
    right: LogicalOperator,
    flags: NodeFlags,
) -> Result<LogicalOperator> {
    let null_supplying = null_supplying_tables(bind_context, join_type, &left, &right);

    if comparisons.is_empty() {
        let condition = match Expression::and_all(arbitrary)? {
            Some(condition) => condition,
            None if join_type == JoinType::Inner => {
                return Ok(LogicalOperator::CrossJoin(
                    Node::new(LogicalCrossJoin, vec![left, right]).with_flags(flags),
                ));
            }
            None => expr::lit(true),
        };

        return Ok(LogicalOperator::ArbitraryJoin(
            Node::new(
                LogicalArbitraryJoin {
                    join_type,
                    condition,
                    null_supplying,
                },
                vec![left, right],
            )
            .with_flags(flags),
        ));
    }

    Ok(LogicalOperator::ComparisonJoin(
        Node::new(
            LogicalComparisonJoin {
                join_type,
                conditions: comparisons,
                residual: Expression::and_all(arbitrary)?,
                null_supplying,
            },
            vec![left, right],
        )
        .with_flags(flags),
    ))
}

fn null_supplying_tables(
    bind_context: &BindContext,
    join_type: JoinType,
    left: &LogicalOperator,
    right: &LogicalOperator,
) -> Vec<TableRef> {
    let (left_nulls, right_nulls) = join_type.null_supplying();
    let mut tables = Vec::new();
    if left_nulls {
        tables.extend(left.get_output_table_refs(bind_context));
    }
    if right_nulls {
        tables.extend(right.get_output_table_refs(bind_context));
    }
    tables
}

/// Wrap `plan` in a filter if there's anything to filter on.
pub fn filter_above(plan: LogicalOperator, filters: Vec<Expression>) -> Result<LogicalOperator> {
    Ok(match LogicalFilter::from_conjuncts(filters)? {
        Some(filter) => LogicalOperator::Filter(Node::new(filter, vec![plan])),
        None => plan,
    })
}

/// Pushes WHERE conjuncts into a planned FROM tree.
#[derive(Debug)]
pub struct FilterPushdown<'a> {
    bind_context: &'a BindContext,
}

impl<'a> FilterPushdown<'a> {
    pub const fn new(bind_context: &'a BindContext) -> Self {
        FilterPushdown { bind_context }
    }

    pub fn push(&self, plan: LogicalOperator, filters: Vec<Expression>) -> Result<LogicalOperator> {
        if filters.is_empty() {
            return Ok(plan);
        }

        match plan {
            LogicalOperator::Filter(mut filter) => {
                let child = filter.take_one_child_exact()?;
                let mut filters = filters;
                filters.extend(filter.into_inner().filter.split_conjunction());
                self.push(child, filters)
            }
            LogicalOperator::CrossJoin(mut join) => {
                let [left, right] = join.take_two_children_exact()?;
                self.push_join(JoinType::Inner, Vec::new(), Vec::new(), left, right, join.flags, filters)
            }
            LogicalOperator::ComparisonJoin(mut join) => {
                let [left, right] = join.take_two_children_exact()?;
                let flags = join.flags;
                let node = join.into_inner();
                let arbitrary = node.residual.map(|r| r.split_conjunction()).unwrap_or_default();
                self.push_join(node.join_type, node.conditions, arbitrary, left, right, flags, filters)
            }
            LogicalOperator::ArbitraryJoin(mut join) => {
                let [left, right] = join.take_two_children_exact()?;
                let flags = join.flags;
                let node = join.into_inner();
                self.push_join(
                    node.join_type,
                    Vec::new(),
                    node.condition.split_conjunction(),
                    left,
                    right,
                    flags,
                    filters,
                )
            }
            other => filter_above(other, filters),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_join(
        &self,
        join_type: JoinType,
        mut comparisons: Vec<JoinCondition>,
        mut arbitrary: Vec<Expression>,
        left: LogicalOperator,
        right: LogicalOperator,
        flags: NodeFlags,
        filters: Vec<Expression>,
    ) -> Result<LogicalOperator> {
        let left_tables = left.get_output_table_refs(self.bind_context);
        let right_tables = right.get_output_table_refs(self.bind_context);

        let mut left_filters = Vec::new();
        let mut right_filters = Vec::new();
        let mut mixed = Vec::new();
        let mut remaining = Vec::new();

        for filter in filters.into_iter().flat_map(|f| f.split_conjunction()) {
            let side = ExprJoinSide::of(&filter, &left_tables, &right_tables);
            match (side, join_type) {
                // WHERE predicates can be pushed to a side whose rows are
                // never NULL padded.
                (ExprJoinSide::Left, JoinType::Inner | JoinType::Left | JoinType::Semi | JoinType::Anti) => {
                    left_filters.push(filter)
                }
                (ExprJoinSide::Right, JoinType::Inner | JoinType::Right) => right_filters.push(filter),
                (ExprJoinSide::Both, JoinType::Inner) => mixed.push(filter),
                _ => remaining.push(filter),
            }
        }

        trace!(
            %join_type,
            left = left_filters.len(),
            right = right_filters.len(),
            join = mixed.len(),
            above = remaining.len(),
            "pushing filters into join"
        );

        let left = self.push(left, left_filters)?;
        let right = self.push(right, right_filters)?;

        if !mixed.is_empty() {
            let extracted = JoinConditionExtractor::new(&left_tables, &right_tables, join_type).extract(mixed)?;
            comparisons.extend(extracted.comparisons);
            arbitrary.extend(extracted.arbitrary);
        }

        let join = plan_join_from_conditions(
            self.bind_context,
            join_type,
            comparisons,
            arbitrary,
            left,
            right,
            flags,
        )?;

        filter_above(join, remaining)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::column_expr::{ColumnExpr, ColumnReference};
    use crate::expr::comparison_expr::ComparisonOperator;
    use crate::logical::logical_empty::LogicalNoRows;
    use crate::types::datatype::DataType;

    fn col(bind_context: &BindContext, table: TableRef) -> Expression {
        let (_, datatype) = bind_context.get_column(table, 0).unwrap();
        Expression::Column(ColumnExpr::new(ColumnReference::new(table, 0), datatype.clone()))
    }

    fn leaf(table: TableRef) -> LogicalOperator {
        LogicalOperator::NoRows(Node::leaf(LogicalNoRows {
            table_refs: vec![table],
        }))
    }

    fn setup() -> (BindContext, TableRef, TableRef) {
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        let t1 = bind_context
            .push_table(scope, None, vec![DataType::Int32], vec!["a".to_string()])
            .unwrap();
        let t2 = bind_context
            .push_table(scope, None, vec![DataType::Int32], vec!["b".to_string()])
            .unwrap();
        (bind_context, t1, t2)
    }

    #[test]
    fn cross_join_becomes_comparison_join() {
        let (bind_context, t1, t2) = setup();
        let plan = LogicalOperator::CrossJoin(Node::new(LogicalCrossJoin, vec![leaf(t1), leaf(t2)]));
        let filters = vec![
            expr::compare(ComparisonOperator::Eq, col(&bind_context, t2), col(&bind_context, t1)),
            expr::compare(ComparisonOperator::Gt, col(&bind_context, t1), expr::lit(4)),
        ];

        let plan = FilterPushdown::new(&bind_context).push(plan, filters).unwrap();
        let join = match plan {
            LogicalOperator::ComparisonJoin(join) => join,
            other => panic!("unexpected plan: {other:?}"),
        };
        assert_eq!(1, join.node.conditions.len());
        // Flipped so the left expression reads the left input.
        assert_eq!(col(&bind_context, t1), *join.node.conditions[0].left);
        assert!(matches!(join.children[0], LogicalOperator::Filter(_)));
        assert!(matches!(join.children[1], LogicalOperator::NoRows(_)));
    }

    #[test]
    fn left_join_keeps_right_filter_above() {
        let (bind_context, t1, t2) = setup();
        let plan = LogicalOperator::ArbitraryJoin(Node::new(
            LogicalArbitraryJoin {
                join_type: JoinType::Left,
                condition: expr::lit(true),
                null_supplying: vec![t2],
            },
            vec![leaf(t1), leaf(t2)],
        ));
        let filters = vec![
            expr::compare(ComparisonOperator::Eq, col(&bind_context, t1), expr::lit(1)),
            expr::compare(ComparisonOperator::Eq, col(&bind_context, t2), expr::lit(2)),
        ];

        let plan = FilterPushdown::new(&bind_context).push(plan, filters).unwrap();
        let filter = match plan {
            LogicalOperator::Filter(filter) => filter,
            other => panic!("unexpected plan: {other:?}"),
        };
        assert_eq!(BTreeSet::from([t2]), filter.node.filter.get_table_references());
        match &filter.children[0] {
            LogicalOperator::ArbitraryJoin(join) => {
                assert_eq!(vec![t2], join.node.null_supplying);
                assert!(matches!(join.children[0], LogicalOperator::Filter(_)));
            }
            other => panic!("unexpected join: {other:?}"),
        }
    }

    #[test]
    fn on_condition_for_preserved_side_stays_in_join() {
        let (bind_context, t1, t2) = setup();
        let extracted = JoinConditionExtractor::new(&[t1], &[t2], JoinType::Left)
            .extract(vec![
                expr::compare(ComparisonOperator::Eq, col(&bind_context, t1), expr::lit(1)),
                expr::compare(ComparisonOperator::Eq, col(&bind_context, t2), expr::lit(1)),
            ])
            .unwrap();
        assert!(extracted.left_filter.is_empty());
        assert_eq!(1, extracted.right_filter.len());
        assert_eq!(1, extracted.arbitrary.len());
    }
}
