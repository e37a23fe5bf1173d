use quarry_ast::ast;
use quarry_error::{DbError, Result};

use crate::expr::column_expr::{ColumnExpr, ColumnReference};
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, Table, TableAlias};

/// A select item after wildcards have been expanded.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedSelectExpr {
    /// An expression still to be bound.
    Expr {
        expr: ast::Expr,
        /// Output name, either the user's alias or one derived from the
        /// expression.
        name: String,
        explicit_alias: bool,
    },
    /// A column produced by expanding a wildcard.
    Column { expr: ColumnExpr, name: String },
}

impl ExpandedSelectExpr {
    pub fn name(&self) -> &str {
        match self {
            Self::Expr { name, .. } => name,
            Self::Column { name, .. } => name,
        }
    }

    pub fn get_alias(&self) -> Option<&str> {
        match self {
            Self::Expr {
                name,
                explicit_alias: true,
                ..
            } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectExprExpander<'a> {
    pub current: BindScopeRef,
    pub bind_context: &'a BindContext,
}

impl<'a> SelectExprExpander<'a> {
    pub fn new(current: BindScopeRef, bind_context: &'a BindContext) -> Self {
        SelectExprExpander {
            current,
            bind_context,
        }
    }

    pub fn expand_all_select_exprs(
        &self,
        exprs: impl IntoIterator<Item = &'a ast::SelectExpr>,
    ) -> Result<Vec<ExpandedSelectExpr>> {
        let mut expanded = Vec::new();
        for expr in exprs {
            self.expand_select_expr(expr, &mut expanded)?;
        }
        Ok(expanded)
    }

    fn expand_select_expr(&self, expr: &ast::SelectExpr, out: &mut Vec<ExpandedSelectExpr>) -> Result<()> {
        match expr {
            ast::SelectExpr::Wildcard => {
                let mut found_table = false;
                for table in self.bind_context.iter_tables(self.current)? {
                    found_table = true;
                    for col_idx in table.visible_columns() {
                        // Right side of a USING pair shows up once.
                        if self
                            .bind_context
                            .is_hidden_using_column(self.current, table.reference, col_idx)?
                        {
                            continue;
                        }
                        out.push(column_of(table, col_idx));
                    }
                }

                if !found_table {
                    return Err(DbError::invalid_input(
                        "SELECT * with no tables specified is not valid",
                    ));
                }
            }
            ast::SelectExpr::QualifiedWildcard(reference) => {
                let (schema, name) = reference.schema_and_name()?;
                let alias = TableAlias::new(schema, name);
                let table = self
                    .bind_context
                    .get_table_by_alias(self.current, &alias)?
                    .ok_or_else(|| {
                        DbError::not_found(format!("Missing table '{alias}', cannot expand '{alias}.*'"))
                            .with_field("table", &alias)
                    })?;

                out.extend(table.visible_columns().map(|col_idx| column_of(table, col_idx)));
            }
            ast::SelectExpr::AliasedExpr(expr, alias) => out.push(ExpandedSelectExpr::Expr {
                expr: expr.clone(),
                name: alias.as_normalized_string(),
                explicit_alias: true,
            }),
            ast::SelectExpr::Expr(expr) => out.push(ExpandedSelectExpr::Expr {
                expr: expr.clone(),
                name: derived_name(expr),
                explicit_alias: false,
            }),
        }

        Ok(())
    }
}

fn column_of(table: &Table, col_idx: usize) -> ExpandedSelectExpr {
    ExpandedSelectExpr::Column {
        expr: ColumnExpr::new(
            ColumnReference::new(table.reference, col_idx),
            table.column_types[col_idx].clone(),
        ),
        name: table.column_names[col_idx].clone(),
    }
}

/// Output name for an unaliased select item.
pub fn derived_name(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Ident(ident) => ident.as_normalized_string(),
        ast::Expr::CompoundIdent(idents) => idents
            .last()
            .map(|i| i.as_normalized_string())
            .unwrap_or_else(|| "?column?".to_string()),
        ast::Expr::Function(func) => func
            .reference
            .0
            .last()
            .map(|i| i.as_normalized_string())
            .unwrap_or_else(|| "?column?".to_string()),
        ast::Expr::Nested(inner) => derived_name(inner),
        ast::Expr::Cast { expr, .. } => derived_name(expr),
        _ => "?column?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::types::datatype::DataType;

    fn names(expanded: &[ExpandedSelectExpr]) -> Vec<&str> {
        expanded.iter().map(|e| e.name()).collect()
    }

    fn context() -> (BindContext, BindScopeRef) {
        let mut bind_context = BindContext::new();
        let scope = bind_context.root_scope_ref();
        bind_context
            .push_table(
                scope,
                Some(TableAlias::new(None, "t1")),
                vec![DataType::Int32, DataType::Utf8 { max_length: None }],
                vec!["a".to_string(), "b".to_string()],
            )
            .unwrap();
        bind_context
            .push_table(
                scope,
                Some(TableAlias::new(None, "t2")),
                vec![DataType::Int32],
                vec!["c".to_string()],
            )
            .unwrap();
        (bind_context, scope)
    }

    #[test]
    fn expand_wildcard() {
        let (bind_context, scope) = context();
        let select = [ast::SelectExpr::Wildcard];
        let expanded = SelectExprExpander::new(scope, &bind_context)
            .expand_all_select_exprs(&select)
            .unwrap();
        assert_eq!(vec!["a", "b", "c"], names(&expanded));
    }

    #[test]
    fn expand_qualified_wildcard() {
        let (bind_context, scope) = context();
        let select = [
            ast::SelectExpr::QualifiedWildcard(ast::ObjectReference::from("t2")),
            ast::SelectExpr::AliasedExpr(ast::Expr::ident("a"), ast::Ident::new("x")),
            ast::SelectExpr::Expr(ast::Expr::call("sum", vec![ast::Expr::ident("a")])),
        ];
        let expanded = SelectExprExpander::new(scope, &bind_context)
            .expand_all_select_exprs(&select)
            .unwrap();
        assert_eq!(vec!["c", "x", "sum"], names(&expanded));
        assert_eq!(Some("x"), expanded[1].get_alias());
        assert_eq!(None, expanded[2].get_alias());
    }

    #[test]
    fn unknown_qualifier() {
        let (bind_context, scope) = context();
        let select = [ast::SelectExpr::QualifiedWildcard(ast::ObjectReference::from("t3"))];
        let err = SelectExprExpander::new(scope, &bind_context)
            .expand_all_select_exprs(&select)
            .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn wildcard_without_tables() {
        let bind_context = BindContext::new();
        let select = [ast::SelectExpr::Wildcard];
        let err = SelectExprExpander::new(bind_context.root_scope_ref(), &bind_context)
            .expand_all_select_exprs(&select)
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }
}
