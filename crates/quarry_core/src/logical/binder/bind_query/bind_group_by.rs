use std::collections::BTreeSet;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::bind_modifier::parse_ordinal;
use super::select_expr_expander::ExpandedSelectExpr;
use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::functions::FunctionKind;
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, TableRef};
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundGroupBy {
    pub group_table: TableRef,
    /// Distinct grouping expressions.
    pub expressions: Vec<Expression>,
    /// Sets of indices into `expressions`. None when every expression is
    /// grouped on at once.
    pub grouping_sets: Option<Vec<BTreeSet<usize>>>,
}

/// A group key after resolving ordinals and select list aliases.
#[derive(Debug)]
enum GroupKey<'b> {
    Ast(&'b ast::Expr),
    Expanded(&'b ExpandedSelectExpr),
}

#[derive(Debug, Clone, Copy)]
pub struct GroupByBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> GroupByBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        GroupByBinder { current, ctx }
    }

    pub fn bind(
        &self,
        bind_context: &mut BindContext,
        select_list: &[ExpandedSelectExpr],
        group_by: &ast::GroupByNode,
    ) -> Result<BoundGroupBy> {
        let mut expressions = Vec::new();

        let grouping_sets = match group_by {
            ast::GroupByNode::All => {
                for item in select_list {
                    if self.is_aggregate_item(item)? {
                        continue;
                    }
                    self.bind_key(bind_context, GroupKey::Expanded(item), &mut expressions)?;
                }
                None
            }
            ast::GroupByNode::Exprs { exprs } => {
                let mut item_sets = Vec::with_capacity(exprs.len());
                let mut has_sets = false;

                for item in exprs {
                    let sets = match item {
                        ast::GroupByExpr::Expr(expr) => {
                            let idx = self.bind_ast_key(bind_context, select_list, expr, &mut expressions)?;
                            vec![BTreeSet::from([idx])]
                        }
                        ast::GroupByExpr::Rollup(exprs) => {
                            has_sets = true;
                            let indices = self.bind_ast_keys(bind_context, select_list, exprs, &mut expressions)?;
                            rollup_sets(&indices)
                        }
                        ast::GroupByExpr::Cube(exprs) => {
                            has_sets = true;
                            let indices = self.bind_ast_keys(bind_context, select_list, exprs, &mut expressions)?;
                            cube_sets(&indices, self.ctx.config.max_grouping_sets)?
                        }
                        ast::GroupByExpr::GroupingSets(lists) => {
                            has_sets = true;
                            let mut sets = Vec::with_capacity(lists.len());
                            for list in lists {
                                let indices =
                                    self.bind_ast_keys(bind_context, select_list, list, &mut expressions)?;
                                sets.push(indices.into_iter().collect());
                            }
                            sets
                        }
                    };
                    item_sets.push(sets);
                }

                if has_sets {
                    Some(cross_product(item_sets, self.ctx.config.max_grouping_sets)?)
                } else {
                    None
                }
            }
        };

        let group_table = bind_context.new_ephemeral_table_from_expressions("__generated_group", &expressions)?;

        trace!(
            keys = expressions.len(),
            sets = grouping_sets.as_ref().map(|s| s.len()),
            %group_table,
            "bound group by"
        );

        Ok(BoundGroupBy {
            group_table,
            expressions,
            grouping_sets,
        })
    }

    fn bind_ast_keys(
        &self,
        bind_context: &mut BindContext,
        select_list: &[ExpandedSelectExpr],
        exprs: &[ast::Expr],
        expressions: &mut Vec<Expression>,
    ) -> Result<Vec<usize>> {
        exprs
            .iter()
            .map(|expr| self.bind_ast_key(bind_context, select_list, expr, expressions))
            .collect()
    }

    fn bind_ast_key(
        &self,
        bind_context: &mut BindContext,
        select_list: &[ExpandedSelectExpr],
        expr: &ast::Expr,
        expressions: &mut Vec<Expression>,
    ) -> Result<usize> {
        let key = self.resolve_key(bind_context, select_list, expr)?;
        self.bind_key(bind_context, key, expressions)
    }

    /// Map ordinals and select aliases to the select item they name.
    ///
    /// Columns of the FROM clause take precedence over aliases.
    fn resolve_key<'b>(
        &self,
        bind_context: &BindContext,
        select_list: &'b [ExpandedSelectExpr],
        expr: &'b ast::Expr,
    ) -> Result<GroupKey<'b>> {
        match expr {
            ast::Expr::Literal(literal) => match parse_ordinal(literal, select_list.len())? {
                Some(idx) => Ok(GroupKey::Expanded(&select_list[idx])),
                None => Ok(GroupKey::Ast(expr)),
            },
            ast::Expr::Ident(ident) => {
                let name = ident.as_normalized_string();
                if bind_context
                    .find_table_for_column(self.current, None, &name)?
                    .is_some()
                {
                    return Ok(GroupKey::Ast(expr));
                }
                let aliased = select_list
                    .iter()
                    .find(|item| item.get_alias() == Some(name.as_str()));
                match aliased {
                    Some(item) => Ok(GroupKey::Expanded(item)),
                    None => Ok(GroupKey::Ast(expr)),
                }
            }
            _ => Ok(GroupKey::Ast(expr)),
        }
    }

    /// Bind a key, returning its index in the deduplicated key list.
    fn bind_key(
        &self,
        bind_context: &mut BindContext,
        key: GroupKey,
        expressions: &mut Vec<Expression>,
    ) -> Result<usize> {
        let expr = match key {
            GroupKey::Expanded(ExpandedSelectExpr::Column { expr, .. }) => Expression::Column(expr.clone()),
            GroupKey::Expanded(ExpandedSelectExpr::Expr { expr, .. }) | GroupKey::Ast(expr) => {
                BaseExpressionBinder::new(self.current, self.ctx).bind_expression(
                    bind_context,
                    expr,
                    &mut DefaultColumnBinder,
                    RecursionContext::new(BindClause::GroupBy),
                )?
            }
        };

        if let Some(idx) = expressions.iter().position(|have| have == &expr) {
            return Ok(idx);
        }
        expressions.push(expr);
        Ok(expressions.len() - 1)
    }

    fn is_aggregate_item(&self, item: &ExpandedSelectExpr) -> Result<bool> {
        match item {
            ExpandedSelectExpr::Column { .. } => Ok(false),
            ExpandedSelectExpr::Expr { expr, .. } => self.contains_aggregate_call(expr),
        }
    }

    /// Check if an unbound expression calls an aggregate, not counting
    /// window calls or calls inside subqueries.
    fn contains_aggregate_call(&self, expr: &ast::Expr) -> Result<bool> {
        match expr {
            ast::Expr::Function(func) => {
                if func.over.is_none() {
                    let (schema, name) = func.reference.schema_and_name()?;
                    // Unknown functions error when the select list is bound.
                    if let Ok((_, entry)) = self.ctx.functions().find_set(schema.as_deref(), &name) {
                        if entry.set.kind == FunctionKind::Aggregate {
                            return Ok(true);
                        }
                    }
                }
                let args = func.args.iter().filter_map(|arg| match arg {
                    ast::FunctionArg::Named {
                        arg: ast::FunctionArgExpr::Expr(expr),
                        ..
                    }
                    | ast::FunctionArg::Unnamed {
                        arg: ast::FunctionArgExpr::Expr(expr),
                    } => Some(expr),
                    _ => None,
                });
                self.any_aggregate_call(args)
            }
            ast::Expr::Tuple(exprs) => self.any_aggregate_call(exprs),
            ast::Expr::Nested(expr)
            | ast::Expr::UnaryExpr { expr, .. }
            | ast::Expr::Cast { expr, .. }
            | ast::Expr::IsNull { expr, .. }
            | ast::Expr::IsBool { expr, .. }
            | ast::Expr::InSubquery { expr, .. } => self.contains_aggregate_call(expr),
            ast::Expr::QuantifiedSubquery { left, .. } => self.contains_aggregate_call(left),
            ast::Expr::BinaryExpr { left, right, .. } | ast::Expr::IsDistinctFrom { left, right, .. } => {
                self.any_aggregate_call([left.as_ref(), right.as_ref()])
            }
            ast::Expr::Case {
                expr,
                conditions,
                results,
                else_expr,
            } => self.any_aggregate_call(
                expr.as_deref()
                    .into_iter()
                    .chain(conditions)
                    .chain(results)
                    .chain(else_expr.as_deref()),
            ),
            ast::Expr::InList { expr, list, .. } => self.any_aggregate_call(std::iter::once(expr.as_ref()).chain(list)),
            ast::Expr::Between { expr, low, high, .. } => {
                self.any_aggregate_call([expr.as_ref(), low.as_ref(), high.as_ref()])
            }
            ast::Expr::Like {
                expr,
                pattern,
                escape,
                ..
            } => self.any_aggregate_call([expr.as_ref(), pattern.as_ref()].into_iter().chain(escape.as_deref())),
            ast::Expr::Ident(_)
            | ast::Expr::CompoundIdent(_)
            | ast::Expr::Literal(_)
            | ast::Expr::Parameter(_)
            | ast::Expr::SessionValue(_)
            | ast::Expr::Exists { .. }
            | ast::Expr::Subquery(_)
            | ast::Expr::NextValueFor(_) => Ok(false),
        }
    }

    fn any_aggregate_call<'e>(&self, exprs: impl IntoIterator<Item = &'e ast::Expr>) -> Result<bool> {
        for expr in exprs {
            if self.contains_aggregate_call(expr)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// `ROLLUP (a, b)` groups on `(a, b)`, `(a)`, `()`.
fn rollup_sets(indices: &[usize]) -> Vec<BTreeSet<usize>> {
    (0..=indices.len())
        .rev()
        .map(|len| indices[..len].iter().copied().collect())
        .collect()
}

/// `CUBE (a, b)` groups on every subset of its keys.
fn cube_sets(indices: &[usize], max: usize) -> Result<Vec<BTreeSet<usize>>> {
    let n = indices.len();
    if n >= usize::BITS as usize || (1usize << n) > max {
        return Err(too_many_sets(max).with_field("cube_keys", n));
    }

    let count = 1usize << n;
    Ok((0..count)
        .rev()
        .map(|mask| {
            indices
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << (n - 1 - bit)) != 0)
                .map(|(_, idx)| *idx)
                .collect()
        })
        .collect())
}

/// Combine the sets of each GROUP BY item. Every combination of one set
/// per item becomes a grouping set.
fn cross_product(item_sets: Vec<Vec<BTreeSet<usize>>>, max: usize) -> Result<Vec<BTreeSet<usize>>> {
    let mut acc = vec![BTreeSet::new()];
    for sets in item_sets {
        let count = acc.len().saturating_mul(sets.len());
        if count > max {
            return Err(too_many_sets(max));
        }
        let mut next = Vec::with_capacity(count);
        for have in &acc {
            for set in &sets {
                next.push(have.union(set).copied().collect::<BTreeSet<_>>());
            }
        }
        acc = next;
    }

    let mut deduped: Vec<BTreeSet<usize>> = Vec::with_capacity(acc.len());
    for set in acc {
        if !deduped.contains(&set) {
            deduped.push(set);
        }
    }
    Ok(deduped)
}

fn too_many_sets(max: usize) -> DbError {
    DbError::resource_exhausted(format!("GROUP BY expands to more than {max} grouping sets"))
        .with_field("max_grouping_sets", max)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_context::TableAlias;
    use crate::logical::binder::bind_query::select_expr_expander::SelectExprExpander;
    use crate::logical::binder::scope_stack::FrameKind;
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn set(idx: &[usize]) -> BTreeSet<usize> {
        idx.iter().copied().collect()
    }

    fn bind(fixture: &Fixture, select: &[ast::SelectExpr], group_by: ast::GroupByNode) -> Result<BoundGroupBy> {
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        bind_context.push_frame(FrameKind::Query, "test");
        bind_context.push_table(
            scope,
            Some(TableAlias::new(None, "t")),
            vec![DataType::Int32, DataType::Int32, DataType::Int32],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )?;

        let expanded = SelectExprExpander::new(scope, &bind_context)
            .expand_all_select_exprs(select)?;
        GroupByBinder::new(scope, &ctx).bind(&mut bind_context, &expanded, &group_by)
    }

    fn exprs(group_by: Vec<ast::GroupByExpr>) -> ast::GroupByNode {
        ast::GroupByNode::Exprs { exprs: group_by }
    }

    fn ident(s: &str) -> ast::Expr {
        ast::Expr::ident(s)
    }

    #[test]
    fn rollup_prefixes() {
        assert_eq!(
            vec![set(&[0, 1]), set(&[0]), set(&[])],
            rollup_sets(&[0, 1])
        );
    }

    #[test]
    fn cube_all_subsets() {
        let sets = cube_sets(&[0, 1], 16).unwrap();
        assert_eq!(
            vec![set(&[0, 1]), set(&[0]), set(&[1]), set(&[])],
            sets
        );
    }

    #[test]
    fn cube_too_large() {
        let err = cube_sets(&[0, 1, 2, 3, 4], 16).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
    }

    #[test]
    fn ordinal_and_alias_keys_dedup() {
        let fixture = Fixture::new();
        let select = [
            ast::SelectExpr::AliasedExpr(ident("a"), ast::Ident::new("x")),
            ast::SelectExpr::Expr(ident("b")),
        ];
        let bound = bind(
            &fixture,
            &select,
            exprs(vec![
                ast::GroupByExpr::Expr(ast::Expr::number(1)),
                ast::GroupByExpr::Expr(ident("x")),
                ast::GroupByExpr::Expr(ident("b")),
            ]),
        )
        .unwrap();

        assert_eq!(2, bound.expressions.len());
        assert_eq!(None, bound.grouping_sets);
    }

    #[test]
    fn rollup_with_plain_key() {
        let fixture = Fixture::new();
        let bound = bind(
            &fixture,
            &[ast::SelectExpr::Wildcard],
            exprs(vec![
                ast::GroupByExpr::Expr(ident("a")),
                ast::GroupByExpr::Rollup(vec![ident("b"), ident("c")]),
            ]),
        )
        .unwrap();

        assert_eq!(
            Some(vec![set(&[0, 1, 2]), set(&[0, 1]), set(&[0])]),
            bound.grouping_sets
        );
    }

    #[test]
    fn grouping_sets_dedup() {
        let fixture = Fixture::new();
        let bound = bind(
            &fixture,
            &[ast::SelectExpr::Wildcard],
            exprs(vec![ast::GroupByExpr::GroupingSets(vec![
                vec![ident("a")],
                vec![ident("a")],
                vec![],
            ])]),
        )
        .unwrap();

        assert_eq!(Some(vec![set(&[0]), set(&[])]), bound.grouping_sets);
    }

    #[test]
    fn cross_product_limit() {
        let mut fixture = Fixture::new();
        fixture.config.max_grouping_sets = 8;
        let err = bind(
            &fixture,
            &[ast::SelectExpr::Wildcard],
            exprs(vec![
                ast::GroupByExpr::Cube(vec![ident("a"), ident("b")]),
                ast::GroupByExpr::Cube(vec![ident("c"), ident("a")]),
            ]),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
    }

    #[test]
    fn ordinal_out_of_range() {
        let fixture = Fixture::new();
        let err = bind(
            &fixture,
            &[ast::SelectExpr::Expr(ident("a"))],
            exprs(vec![ast::GroupByExpr::Expr(ast::Expr::number(2))]),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn group_by_all_skips_aggregates() {
        let fixture = Fixture::new();
        let bound = bind(
            &fixture,
            &[
                ast::SelectExpr::Expr(ident("a")),
                ast::SelectExpr::Expr(ast::Expr::call("sum", vec![ident("b")])),
                ast::SelectExpr::Expr(ident("c")),
            ],
            ast::GroupByNode::All,
        )
        .unwrap();
        assert_eq!(2, bound.expressions.len());
    }
}
