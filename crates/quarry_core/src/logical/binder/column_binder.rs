use quarry_ast::ast;
use quarry_error::{DbError, Result};

use super::bind_context::{BindContext, BindScopeRef, TableAlias};
use super::expr_binder::RecursionContext;
use crate::expr::Expression;
use crate::expr::column_expr::{ColumnExpr, ColumnReference};

/// Hook for binding column references in an expression.
///
/// Binders for specific clauses wrap [`DefaultColumnBinder`] to add their own
/// lookups, e.g. select list aliases in ORDER BY. Returning `Ok(None)` lets
/// the expression binder keep searching variables and outer scopes.
pub trait ExpressionColumnBinder {
    /// Bind a literal that appears at the root of an expression.
    ///
    /// Only GROUP BY and ORDER BY treat these specially (ordinals).
    fn bind_from_root_literal(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        literal: &ast::Literal,
    ) -> Result<Option<Expression>>;

    fn bind_from_ident(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        ident: &ast::Ident,
        recur: RecursionContext,
    ) -> Result<Option<Expression>>;

    fn bind_from_idents(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        idents: &[ast::Ident],
        recur: RecursionContext,
    ) -> Result<Option<Expression>>;
}

/// Binds columns against tables in the current scope only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultColumnBinder;

impl ExpressionColumnBinder for DefaultColumnBinder {
    fn bind_from_root_literal(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        _literal: &ast::Literal,
    ) -> Result<Option<Expression>> {
        Ok(None)
    }

    fn bind_from_ident(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        ident: &ast::Ident,
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        let col = ident.as_normalized_string();
        Self::bind_column(bind_scope, bind_context, None, &col)
    }

    fn bind_from_idents(
        &mut self,
        bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        idents: &[ast::Ident],
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        let (alias, col) = split_qualified(idents)?;
        Self::bind_column(bind_scope, bind_context, Some(&alias), &col)
    }
}

impl DefaultColumnBinder {
    pub fn bind_column(
        bind_scope: BindScopeRef,
        bind_context: &BindContext,
        alias: Option<&TableAlias>,
        col: &str,
    ) -> Result<Option<Expression>> {
        let (table, col_idx) = match bind_context.find_table_for_column(bind_scope, alias, col)? {
            Some(found) => found,
            None => return Ok(None),
        };
        let (_, datatype) = bind_context.get_column(table, col_idx)?;

        Ok(Some(Expression::Column(ColumnExpr::new(
            ColumnReference::new(table, col_idx),
            datatype.clone(),
        ))))
    }
}

/// Rejects every column reference.
///
/// Used where only constant expressions make sense (LIMIT, column
/// defaults, table function arguments).
#[derive(Debug, Clone, Copy)]
pub struct ErroringColumnBinder {
    pub clause: &'static str,
}

impl ErroringColumnBinder {
    pub const fn new(clause: &'static str) -> Self {
        ErroringColumnBinder { clause }
    }

    fn error(&self, name: impl std::fmt::Display) -> DbError {
        DbError::invalid_input(format!(
            "Column references are not allowed in {}, found '{name}'",
            self.clause
        ))
        .with_field("clause", self.clause)
    }
}

impl ExpressionColumnBinder for ErroringColumnBinder {
    fn bind_from_root_literal(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        _literal: &ast::Literal,
    ) -> Result<Option<Expression>> {
        Ok(None)
    }

    fn bind_from_ident(
        &mut self,
        _bind_scope: BindScopeRef,
        bind_context: &mut BindContext,
        ident: &ast::Ident,
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        // Variables are still fine.
        let name = ident.as_normalized_string();
        if bind_context.frames().resolve(&name).is_some() {
            return Ok(None);
        }
        Err(self.error(ident))
    }

    fn bind_from_idents(
        &mut self,
        _bind_scope: BindScopeRef,
        _bind_context: &mut BindContext,
        idents: &[ast::Ident],
        _recur: RecursionContext,
    ) -> Result<Option<Expression>> {
        Err(self.error(ast::ObjectReference(idents.to_vec())))
    }
}

/// Split `[schema.]table.column` into a table alias and column name.
pub fn split_qualified(idents: &[ast::Ident]) -> Result<(TableAlias, String)> {
    match idents {
        [table, col] => Ok((
            TableAlias::new(None, table.as_normalized_string()),
            col.as_normalized_string(),
        )),
        [schema, table, col] => Ok((
            TableAlias::new(
                Some(schema.as_normalized_string()),
                table.as_normalized_string(),
            ),
            col.as_normalized_string(),
        )),
        _ => Err(DbError::invalid_input(format!(
            "Too many parts in column reference '{}'",
            ast::ObjectReference(idents.to_vec())
        ))),
    }
}
