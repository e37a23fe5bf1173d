pub mod bind_cte;
pub mod bind_from;
pub mod bind_group_by;
pub mod bind_modifier;
pub mod bind_select;
pub mod bind_select_list;
pub mod bind_setop;
pub mod bind_values;
pub mod select_expr_expander;
pub mod select_list;

use bind_modifier::{BoundModifiers, ModifierBinder, OutputColumnBinder};
use bind_select::{BoundSelect, SelectBinder};
use bind_setop::{BoundSetOp, SetOpBinder};
use bind_values::{BoundValues, ValuesBinder};
use quarry_ast::ast;
use quarry_error::Result;

use super::bind_context::{BindContext, BindScopeRef, TableRef};
use super::scope_stack::FrameKind;
use crate::compile::CompileContext;
use crate::logical::operator::LogicalOperator;
use crate::logical::planner::plan_query::QueryPlanner;
use crate::logical::planner::prune::ColumnPruner;

#[derive(Debug, Clone, PartialEq)]
pub enum BoundQuery {
    Select(BoundSelect),
    SetOp(BoundSetOp),
    Values(BoundValues),
    /// ORDER BY or LIMIT applied to the output of a parenthesized query,
    /// VALUES, or set operation.
    Modified {
        inner: Box<BoundQuery>,
        modifiers: BoundModifiers,
    },
}

impl BoundQuery {
    /// Table holding the final output of the query.
    pub fn output_table(&self) -> TableRef {
        match self {
            Self::Select(select) => select.select_list.output_table(),
            Self::SetOp(setop) => setop.setop_table,
            Self::Values(values) => values.expressions_table,
            Self::Modified { inner, .. } => inner.output_table(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> QueryBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        QueryBinder { current, ctx }
    }

    pub fn bind(&self, bind_context: &mut BindContext, query: &ast::QueryNode) -> Result<BoundQuery> {
        if let Some(ctes) = &query.ctes {
            bind_cte::CteBinder::new(self.current, self.ctx).bind(bind_context, ctes)?;
        }
        self.bind_body(bind_context, &query.body, &query.order_by, &query.limit)
    }

    pub fn bind_body(
        &self,
        bind_context: &mut BindContext,
        body: &ast::QueryNodeBody,
        order_by: &[ast::OrderByNode],
        limit: &ast::LimitModifier,
    ) -> Result<BoundQuery> {
        let inner = match body {
            ast::QueryNodeBody::Select(select) => {
                // Selects bind their own modifiers against the select list.
                let select = SelectBinder::new(self.current, self.ctx)
                    .bind(bind_context, select, order_by, limit)?;
                return Ok(BoundQuery::Select(select));
            }
            ast::QueryNodeBody::Nested(nested) => self.bind(bind_context, nested)?,
            ast::QueryNodeBody::Set {
                left,
                right,
                operation,
                all,
                corresponding,
            } => BoundQuery::SetOp(SetOpBinder::new(self.current, self.ctx).bind(
                bind_context,
                left,
                right,
                *operation,
                *all,
                corresponding.as_ref(),
            )?),
            ast::QueryNodeBody::Values(values) => {
                BoundQuery::Values(ValuesBinder::new(self.current, self.ctx).bind(bind_context, values)?)
            }
        };

        if order_by.is_empty() && limit.is_empty() {
            return Ok(inner);
        }

        let output = inner.output_table();
        let modifier_binder = ModifierBinder::new(self.current, self.ctx);
        let mut column_binder = OutputColumnBinder::new(bind_context, output)?;
        let order_by = modifier_binder.bind_order_by(bind_context, order_by, &mut column_binder)?;
        let limit = modifier_binder.bind_limit(bind_context, limit)?;

        Ok(BoundQuery::Modified {
            inner: Box::new(inner),
            modifiers: BoundModifiers { order_by, limit },
        })
    }
}

/// Bind and plan a query in `scope`.
///
/// CTEs declared by the query are visible only while it's being bound. Scans
/// in the returned plan only read the columns the query uses.
pub fn plan_query(
    ctx: &CompileContext,
    bind_context: &mut BindContext,
    scope: BindScopeRef,
    query: &ast::QueryNode,
) -> Result<LogicalOperator> {
    bind_context.with_frame(FrameKind::Query, "query", |bind_context| {
        let bound = QueryBinder::new(scope, ctx).bind(bind_context, query)?;
        let mut plan = QueryPlanner::new(ctx).plan(bind_context, bound)?;
        ColumnPruner::default().prune(&mut plan)?;
        Ok(plan)
    })
}

/// Bind and plan a subquery of `current` in a new child scope.
pub fn plan_subquery(
    ctx: &CompileContext,
    bind_context: &mut BindContext,
    current: BindScopeRef,
    query: &ast::QueryNode,
) -> Result<(BindScopeRef, LogicalOperator)> {
    let scope = bind_context.new_child_scope(current);
    let plan = plan_query(ctx, bind_context, scope, query)?;
    Ok((scope, plan))
}
