use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::plan_query;
use crate::compile::CompileContext;
use crate::logical::binder::bind_context::{BindContext, BindScopeRef, BoundCte};
use crate::logical::operator::LogicalNode;

/// Binds WITH clauses.
///
/// Each CTE body is planned once in its own scope and declared as a view in
/// the current frame. References in FROM get a copy of the plan.
#[derive(Debug, Clone, Copy)]
pub struct CteBinder<'a> {
    pub current: BindScopeRef,
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> CteBinder<'a> {
    pub const fn new(current: BindScopeRef, ctx: &'a CompileContext<'a>) -> Self {
        CteBinder { current, ctx }
    }

    pub fn bind(&self, bind_context: &mut BindContext, ctes: &ast::CommonTableExprs) -> Result<()> {
        if ctes.recursive {
            return Err(DbError::unsupported("Recursive CTEs are not supported"));
        }

        for cte in &ctes.ctes {
            let name = cte.alias.as_normalized_string();

            // CTE bodies can't see columns of the query declaring them.
            let scope = bind_context.new_orphan_scope();
            let plan = plan_query(self.ctx, bind_context, scope, &cte.body)?;

            let output = match plan.get_output_table_refs(bind_context).as_slice() {
                [output] => *output,
                refs => {
                    return Err(DbError::new(format!(
                        "Expected CTE body to produce a single table, got {}",
                        refs.len()
                    )));
                }
            };

            let table = bind_context.get_table(output)?;
            let column_types = table.column_types.clone();
            let mut column_names = table.column_names.clone();

            if let Some(aliases) = &cte.column_aliases {
                if aliases.len() != column_names.len() {
                    return Err(DbError::arity_mismatch(format!(
                        "CTE '{name}' has {} columns, but {} column aliases were given",
                        column_names.len(),
                        aliases.len()
                    ))
                    .with_field("cte", name));
                }
                column_names = aliases.iter().map(|a| a.as_normalized_string()).collect();
            }

            trace!(%name, columns = column_names.len(), materialized = cte.materialized, "bound cte");

            bind_context.add_cte(BoundCte {
                bind_scope: scope,
                materialized: cte.materialized,
                name,
                column_names,
                column_types,
                plan,
                output,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::scope_stack::FrameKind;
    use crate::testutil::Fixture;

    fn values_query(row: Vec<&str>) -> ast::QueryNode {
        ast::QueryNode::values(vec![
            row.into_iter()
                .map(|n| ast::Expr::Literal(ast::Literal::Number(n.to_string())))
                .collect(),
        ])
    }

    fn bind(ctes: ast::CommonTableExprs) -> Result<BindContext> {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut bind_context = BindContext::new();
        let root = bind_context.root_scope_ref();
        bind_context.push_frame(FrameKind::Query, "test");
        CteBinder::new(root, &ctx).bind(&mut bind_context, &ctes)?;
        Ok(bind_context)
    }

    #[test]
    fn cte_with_aliases() {
        let mut cte = ast::CommonTableExpr::new("c", values_query(vec!["1", "2"]));
        cte.column_aliases = Some(vec![ast::Ident::new("x"), ast::Ident::new("y")]);

        let bind_context = bind(ast::CommonTableExprs {
            recursive: false,
            ctes: vec![cte],
        })
        .unwrap();

        let cte_ref = bind_context.frames().resolve_view("c").unwrap();
        let cte = bind_context.get_cte(cte_ref).unwrap();
        assert_eq!(vec!["x".to_string(), "y".to_string()], cte.column_names);
    }

    #[test]
    fn alias_count_mismatch() {
        let mut cte = ast::CommonTableExpr::new("c", values_query(vec!["1", "2"]));
        cte.column_aliases = Some(vec![ast::Ident::new("x")]);

        let err = bind(ast::CommonTableExprs {
            recursive: false,
            ctes: vec![cte],
        })
        .unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }

    #[test]
    fn recursive_unsupported() {
        let err = bind(ast::CommonTableExprs {
            recursive: true,
            ctes: vec![ast::CommonTableExpr::new("c", values_query(vec!["1"]))],
        })
        .unwrap_err();
        assert_eq!(ErrorKind::UnsupportedConstruct, err.kind());
    }

    #[test]
    fn duplicate_cte_name() {
        let err = bind(ast::CommonTableExprs {
            recursive: false,
            ctes: vec![
                ast::CommonTableExpr::new("c", values_query(vec!["1"])),
                ast::CommonTableExpr::new("c", values_query(vec!["2"])),
            ],
        })
        .unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }
}
