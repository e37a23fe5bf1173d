use std::collections::HashMap;

use quarry_ast::ast;
use quarry_error::Result;

use super::select_expr_expander::ExpandedSelectExpr;
use super::select_list::SelectList;
use crate::compile::CompileContext;
use crate::expr::Expression;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, TableRef};
use crate::logical::binder::column_binder::DefaultColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};

#[derive(Debug)]
pub struct SelectListBinder<'a> {
    current: BindScopeRef,
    ctx: &'a CompileContext<'a>,
    named_windows: &'a [ast::NamedWindow],
}

impl<'a> SelectListBinder<'a> {
    pub fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        SelectListBinder {
            current,
            ctx,
            named_windows: &[],
        }
    }

    pub fn with_named_windows(mut self, windows: &'a [ast::NamedWindow]) -> Self {
        self.named_windows = windows;
        self
    }

    pub fn bind(&self, bind_context: &mut BindContext, projections: Vec<ExpandedSelectExpr>) -> Result<SelectList> {
        // Aliases can be referenced from ORDER BY.
        let mut alias_map = HashMap::new();
        for (idx, projection) in projections.iter().enumerate() {
            if let Some(alias) = projection.get_alias() {
                alias_map.insert(alias.to_string(), idx);
            }
        }

        let names: Vec<_> = projections.iter().map(|p| p.name().to_string()).collect();

        let expr_binder =
            BaseExpressionBinder::new(self.current, self.ctx).with_named_windows(self.named_windows);
        let mut exprs = Vec::with_capacity(projections.len());
        for proj in projections {
            match proj {
                ExpandedSelectExpr::Expr { expr, .. } => {
                    let expr = expr_binder.bind_expression(
                        bind_context,
                        &expr,
                        &mut DefaultColumnBinder,
                        RecursionContext::new(BindClause::Select),
                    )?;
                    exprs.push(expr);
                }
                ExpandedSelectExpr::Column { expr, .. } => exprs.push(Expression::Column(expr)),
            }
        }

        let types = exprs.iter().map(|expr| expr.datatype()).collect();
        let projections_table = bind_context.new_ephemeral_table_with_columns(types, names)?;

        Ok(SelectList {
            projections_table,
            alias_map,
            projections: exprs,
            appended: Vec::new(),
        })
    }

    /// Replace aggregates in `expression` with references to new columns in
    /// the aggregates table.
    pub(crate) fn extract_aggregates(
        aggregates_table: TableRef,
        bind_context: &mut BindContext,
        expression: &mut Expression,
        aggregates: &mut Vec<Expression>,
    ) -> Result<()> {
        if let Expression::Aggregate(agg) = expression {
            let name = agg.agg.name;
            let datatype = expression.datatype();
            let col_idx = bind_context.push_column_for_table(aggregates_table, name, datatype.clone())?;
            let agg = std::mem::replace(
                expression,
                Expression::Column(ColumnExpr::new(
                    ColumnReference::new(aggregates_table, col_idx),
                    datatype,
                )),
            );
            aggregates.push(agg);
            return Ok(());
        }

        expression.for_each_child_mut(&mut |expr| {
            Self::extract_aggregates(aggregates_table, bind_context, expr, aggregates)
        })
    }

    /// Replace windows in `expression` with references to new columns in the
    /// windows table.
    pub(crate) fn extract_windows(
        windows_table: TableRef,
        bind_context: &mut BindContext,
        expression: &mut Expression,
        windows: &mut Vec<Expression>,
    ) -> Result<()> {
        if let Expression::Window(window) = expression {
            let name = window.agg.name;
            let datatype = expression.datatype();
            let col_idx = bind_context.push_column_for_table(windows_table, name, datatype.clone())?;
            let window = std::mem::replace(
                expression,
                Expression::Column(ColumnExpr::new(
                    ColumnReference::new(windows_table, col_idx),
                    datatype,
                )),
            );
            windows.push(window);
            return Ok(());
        }

        expression.for_each_child_mut(&mut |expr| {
            Self::extract_windows(windows_table, bind_context, expr, windows)
        })
    }
}
