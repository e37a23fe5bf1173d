use quarry_ast::ast;
use quarry_error::Result;
use tracing::trace;

use super::bind_from::{BoundFrom, FromBinder};
use super::bind_group_by::{BoundGroupBy, GroupByBinder};
use super::bind_modifier::{BoundModifiers, ModifierBinder};
use super::bind_select_list::SelectListBinder;
use super::select_expr_expander::SelectExprExpander;
use super::select_list::{BoundSelectList, FinalizeInput, SelectList};
use crate::compile::CompileContext;
use crate::expr::{self, Expression};
use crate::expr::cast_expr::check_type;
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, GroupingState};
use crate::logical::binder::column_binder::{DefaultColumnBinder, ExpressionColumnBinder};
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSelect {
    pub from: BoundFrom,
    pub filter: Option<Expression>,
    pub group_by: Option<BoundGroupBy>,
    pub having: Option<Expression>,
    pub select_list: BoundSelectList,
    /// ORDER BY expressions reference the projections table.
    pub modifiers: BoundModifiers,
    pub distinct: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> SelectBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        SelectBinder { current, ctx }
    }

    pub fn bind(
        &self,
        bind_context: &mut BindContext,
        select: &ast::SelectNode,
        order_by: &[ast::OrderByNode],
        limit: &ast::LimitModifier,
    ) -> Result<BoundSelect> {
        let from = FromBinder::new(self.current, self.ctx).bind(bind_context, select.from.as_ref())?;

        let expr_binder = BaseExpressionBinder::new(self.current, self.ctx);

        let filter = match &select.where_expr {
            Some(expr) => {
                let expr = expr_binder.bind_expression(
                    bind_context,
                    expr,
                    &mut DefaultColumnBinder,
                    RecursionContext::new(BindClause::Where),
                )?;
                Some(check_type(&DataType::Boolean, expr)?)
            }
            None => None,
        };

        let projections =
            SelectExprExpander::new(self.current, bind_context).expand_all_select_exprs(&select.projections)?;

        // Aggregates from nested subqueries may be pushed into this table while
        // the select list is being bound.
        let aggregates_table = bind_context.new_ephemeral_table()?;
        bind_context.set_grouping(self.current, GroupingState::new(aggregates_table))?;

        let group_by = match &select.group_by {
            Some(group_by) => {
                let bound = GroupByBinder::new(self.current, self.ctx).bind(bind_context, &projections, group_by)?;
                if let Some(grouping) = bind_context.get_grouping_mut(self.current)? {
                    grouping.group_table = Some(bound.group_table);
                    grouping.group_exprs = bound.expressions.clone();
                }
                Some(bound)
            }
            None => None,
        };

        set_accepting(bind_context, self.current, true)?;

        let mut select_list = SelectListBinder::new(self.current, self.ctx)
            .with_named_windows(&select.windows)
            .bind(bind_context, projections)?;

        let mut having = match &select.having {
            Some(expr) => {
                let expr = expr_binder.bind_expression(
                    bind_context,
                    expr,
                    &mut DefaultColumnBinder,
                    RecursionContext::new(BindClause::Having),
                )?;
                Some(check_type(&DataType::Boolean, expr)?)
            }
            None => None,
        };

        let modifier_binder = ModifierBinder::new(self.current, self.ctx);
        let mut order_by = modifier_binder.bind_order_by(
            bind_context,
            order_by,
            &mut SelectListColumnBinder {
                select_list: &select_list,
            },
        )?;

        // Every ORDER BY expression is computed by the select list.
        if let Some(order_by) = order_by.as_mut() {
            for order_expr in &mut order_by.exprs {
                let expr = std::mem::replace(&mut order_expr.expr, expr::lit(ScalarValue::null()));
                let col = select_list.column_for_expression(bind_context, expr)?;
                order_expr.expr = Expression::Column(col);
            }
        }

        let limit = modifier_binder.bind_limit(bind_context, limit)?;

        set_accepting(bind_context, self.current, false)?;
        let (pushed_aggregates, ungrouped_outer_refs) = bind_context
            .take_grouping(self.current)?
            .map(|grouping| (grouping.pushed_aggregates, grouping.ungrouped_outer_refs))
            .unwrap_or_default();

        let select_list = select_list.finalize(
            bind_context,
            FinalizeInput {
                aggregates_table,
                pushed_aggregates,
                ungrouped_outer_refs,
                group_by: group_by.as_ref(),
                having: having.as_mut(),
                distinct: select.distinct,
            },
        )?;

        trace!(
            projections = select_list.projections.len(),
            aggregates = select_list.aggregates.len(),
            windows = select_list.windows.len(),
            "bound select"
        );

        Ok(BoundSelect {
            from,
            filter,
            group_by,
            having,
            select_list,
            modifiers: BoundModifiers { order_by, limit },
            distinct: select.distinct,
        })
    }
}

fn set_accepting(bind_context: &mut BindContext, scope: BindScopeRef, accepting: bool) -> Result<()> {
    if let Some(grouping) = bind_context.get_grouping_mut(scope)? {
        grouping.accepting = accepting;
    }
    Ok(())
}

/// Binds ORDER BY, trying select list ordinals and aliases before columns
/// of the FROM clause.
#[derive(Debug)]
struct SelectListColumnBinder<'s> {
    select_list: &'s SelectList,
}

impl ExpressionColumnBinder for SelectListColumnBinder<'_> {
    fn bind_from_root_literal(
        &mut self,
        _bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        literal: &ast::Literal,
    ) -> Result<Option<Expression>> {
        Ok(self
            .select_list
            .column_by_ordinal(bind_context, literal)?
            .map(Expression::Column))
    }

    fn bind_from_ident(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        ident: &ast::Ident,
        recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        if recur.is_root {
            if let Some(col) = self.select_list.column_by_user_alias(bind_context, ident)? {
                return Ok(Some(Expression::Column(col)));
            }
        }
        DefaultColumnBinder.bind_from_ident(bind_scope, bind_context, ident, recur)
    }

    fn bind_from_idents(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        idents: &[ast::Ident],
        recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        DefaultColumnBinder.bind_from_idents(bind_scope, bind_context, idents, recur)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::scope_stack::FrameKind;
    use crate::testutil::Fixture;

    fn fixture() -> Fixture {
        Fixture::new().with_table(
            "t",
            &[
                ("a", DataType::Int32),
                ("b", DataType::Utf8 { max_length: Some(10) }),
            ],
        )
    }

    fn bind(fixture: &Fixture, select: ast::SelectNode, order_by: Vec<ast::OrderByNode>) -> Result<BoundSelect> {
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        bind_context.with_frame(FrameKind::Query, "test", |bind_context| {
            SelectBinder::new(scope, &ctx).bind(bind_context, &select, &order_by, &ast::LimitModifier::default())
        })
    }

    fn ident(s: &str) -> ast::Expr {
        ast::Expr::ident(s)
    }

    fn order(expr: ast::Expr) -> ast::OrderByNode {
        ast::OrderByNode {
            typ: None,
            nulls: None,
            expr,
        }
    }

    #[test]
    fn group_by_with_count() {
        let select = ast::SelectNode::new(vec![
            ast::SelectExpr::Expr(ident("a")),
            ast::SelectExpr::Expr(ast::Expr::count_star()),
        ])
        .from(ast::FromNode::table("t"))
        .group_by(vec![ast::GroupByExpr::Expr(ident("a"))]);

        let bound = bind(&fixture(), select, Vec::new()).unwrap();
        let group_by = bound.group_by.unwrap();
        assert_eq!(1, group_by.expressions.len());
        assert_eq!(1, bound.select_list.aggregates.len());
        match &bound.select_list.projections[0] {
            Expression::Column(col) => assert_eq!(group_by.group_table, col.reference.table_scope),
            other => panic!("unexpected projection: {other:?}"),
        }
    }

    #[test]
    fn ungrouped_column() {
        let select = ast::SelectNode::new(vec![
            ast::SelectExpr::Expr(ident("a")),
            ast::SelectExpr::Expr(ident("b")),
        ])
        .from(ast::FromNode::table("t"))
        .group_by(vec![ast::GroupByExpr::Expr(ident("a"))]);

        let err = bind(&fixture(), select, Vec::new()).unwrap_err();
        assert_eq!(ErrorKind::GroupByViolation, err.kind());
    }

    #[test]
    fn aggregate_without_group_by() {
        let select = ast::SelectNode::new(vec![
            ast::SelectExpr::Expr(ident("a")),
            ast::SelectExpr::Expr(ast::Expr::count_star()),
        ])
        .from(ast::FromNode::table("t"));

        let err = bind(&fixture(), select, Vec::new()).unwrap_err();
        assert_eq!(ErrorKind::GroupByViolation, err.kind());
    }

    #[test]
    fn order_by_alias_and_hidden_column() {
        let select = ast::SelectNode::new(vec![ast::SelectExpr::AliasedExpr(
            ident("a"),
            ast::Ident::new("x"),
        )])
        .from(ast::FromNode::table("t"));

        let bound = bind(&fixture(), select, vec![order(ident("x")), order(ident("b"))]).unwrap();

        // "b" is appended and pruned by the output table.
        assert_eq!(2, bound.select_list.projections.len());
        assert!(bound.select_list.output.is_some());
        assert_eq!(2, bound.modifiers.order_by.unwrap().exprs.len());
    }

    #[test]
    fn distinct_rejects_hidden_order_column() {
        let mut select = ast::SelectNode::new(vec![ast::SelectExpr::Expr(ident("a"))]).from(ast::FromNode::table("t"));
        select.distinct = true;

        let err = bind(&fixture(), select, vec![order(ident("b"))]).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn order_by_ordinal() {
        let select = ast::SelectNode::new(vec![
            ast::SelectExpr::Expr(ident("a")),
            ast::SelectExpr::Expr(ident("b")),
        ])
        .from(ast::FromNode::table("t"));

        let bound = bind(&fixture(), select, vec![order(ast::Expr::number(2))]).unwrap();
        assert!(bound.select_list.output.is_none());
        let order_by = bound.modifiers.order_by.unwrap();
        match &order_by.exprs[0].expr {
            Expression::Column(col) => assert_eq!(1, col.reference.column),
            other => panic!("unexpected order expression: {other:?}"),
        }
    }

    #[test]
    fn where_must_be_boolean() {
        let fixture = fixture().with_table("d", &[("day", DataType::Date32)]);
        let select = ast::SelectNode::new(vec![ast::SelectExpr::Wildcard])
            .from(ast::FromNode::table("d"))
            .filter(ident("day"));

        let err = bind(&fixture, select, Vec::new()).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    fn grouped_fixture() -> Fixture {
        Fixture::new()
            .with_table("g", &[("a", DataType::Int32), ("b", DataType::Int32)])
            .with_table("u", &[("x", DataType::Int32)])
    }

    /// `(SELECT <projection> FROM u)`
    fn scalar_subquery(projection: ast::Expr) -> ast::SelectExpr {
        ast::SelectExpr::Expr(ast::Expr::subquery(ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Expr(projection)]).from(ast::FromNode::table("u")),
        )))
    }

    fn sum_x_plus(outer: &str) -> ast::Expr {
        ast::Expr::call(
            "sum",
            vec![ast::Expr::binary(
                ast::Expr::compound(&["u", "x"]),
                ast::BinaryOperator::Plus,
                ast::Expr::compound(&["g", outer]),
            )],
        )
    }

    #[test]
    fn subquery_reads_ungrouped_column_of_aggregated_select() {
        let fixture = grouped_fixture();
        let count = || ast::SelectExpr::Expr(ast::Expr::count_star());
        let outer_b = || scalar_subquery(ast::Expr::compound(&["g", "b"]));

        for projections in [vec![count(), outer_b()], vec![outer_b(), count()]] {
            let select = ast::SelectNode::new(projections).from(ast::FromNode::table("g"));
            let err = bind(&fixture, select, Vec::new()).unwrap_err();
            assert_eq!(ErrorKind::GroupByViolation, err.kind());
            assert!(err.to_string().contains('b'), "{err}");
        }
    }

    #[test]
    fn subquery_reads_outer_column_of_plain_select() {
        let select = ast::SelectNode::new(vec![scalar_subquery(ast::Expr::compound(&["g", "b"]))])
            .from(ast::FromNode::table("g"));
        let bound = bind(&grouped_fixture(), select, Vec::new()).unwrap();
        assert!(bound.select_list.aggregates.is_empty());
    }

    #[test]
    fn subquery_aggregate_mixing_ungrouped_outer_column() {
        let select = ast::SelectNode::new(vec![scalar_subquery(sum_x_plus("b"))])
            .from(ast::FromNode::table("g"))
            .group_by(vec![ast::GroupByExpr::Expr(ast::Expr::compound(&["g", "a"]))]);

        let err = bind(&grouped_fixture(), select, Vec::new()).unwrap_err();
        assert_eq!(ErrorKind::GroupByViolation, err.kind());
    }

    #[test]
    fn subquery_aggregate_mixing_group_column() {
        let select = ast::SelectNode::new(vec![scalar_subquery(sum_x_plus("a"))])
            .from(ast::FromNode::table("g"))
            .group_by(vec![ast::GroupByExpr::Expr(ast::Expr::compound(&["g", "a"]))]);

        let bound = bind(&grouped_fixture(), select, Vec::new()).unwrap();
        let group_table = bound.group_by.unwrap().group_table;
        match &bound.select_list.projections[0] {
            Expression::Subquery(subquery) => {
                assert!(!subquery.correlated_columns.is_empty());
                assert!(
                    subquery.correlated_columns.iter().all(|c| c.table == group_table),
                    "{:?}",
                    subquery.correlated_columns
                );
            }
            other => panic!("unexpected projection: {other:?}"),
        }
    }

    #[test]
    fn subquery_aggregate_of_outer_column_moves_out() {
        let select = ast::SelectNode::new(vec![scalar_subquery(ast::Expr::call(
            "sum",
            vec![ast::Expr::compound(&["g", "b"])],
        ))])
        .from(ast::FromNode::table("g"));

        let bound = bind(&grouped_fixture(), select, Vec::new()).unwrap();
        assert_eq!(1, bound.select_list.aggregates.len());
    }
}
