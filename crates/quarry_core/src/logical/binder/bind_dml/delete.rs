use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::maintenance::{Maintenance, MaintenancePlanner, RowImage};
use super::{BoundTarget, DmlBinder, project};
use crate::catalog::privilege::Privileges;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::logical_dml::{LogicalDelete, LogicalTruncate};
use crate::logical::operator::{LogicalOperator, Node};
use crate::logical::planner::filter_pushdown::FilterPushdown;
use crate::logical::planner::plan_from::{mark_outer_referenced, plan_scan};

impl<'a> DmlBinder<'a> {
    pub fn bind_delete(&self, bind_context: &mut BindContext, delete: &ast::Delete) -> Result<LogicalOperator> {
        let scope = bind_context.new_orphan_scope();
        let target = self.bind_target(bind_context, scope, &delete.table, delete.alias.as_ref(), "delete from")?;
        self.require_table_privs(&target.schema, &target.entry.name, Privileges::DELETE)?;

        let plan = plan_scan(target.table_ref, &target.schema, &target.entry);
        let filters = self.bind_where(bind_context, scope, delete.where_expr.as_ref())?;
        let mut plan = FilterPushdown::new(bind_context).push(plan, filters)?;
        mark_outer_referenced(bind_context, &mut plan)?;

        self.plan_delete_rows(bind_context, &target, plan)
    }

    /// Plan deleting the target rows produced by `plan`.
    pub(crate) fn plan_delete_rows(
        &self,
        bind_context: &mut BindContext,
        target: &BoundTarget,
        plan: LogicalOperator,
    ) -> Result<LogicalOperator> {
        let entry = &target.entry;
        let image = RowImage {
            table_ref: target.table_ref,
            positions: (0..entry.columns.len()).map(Some).collect(),
        };
        let index_keys = MaintenancePlanner::new(self.ctx, &target.schema, entry).index_keys(&image, &|_| true)?;
        let (projections, index_keys, _) = Maintenance {
            index_keys,
            foreign_keys: Vec::new(),
        }
        .append_to(vec![target.row_id_expr()]);
        let (plan, _) = project(bind_context, "__delete", projections, plan)?;

        let referenced_by = self.referenced_by(&target.schema, entry)?;
        debug!(table = %entry.name, referenced_by = referenced_by.len(), "bound delete");

        Ok(LogicalOperator::Delete(Node::new(
            LogicalDelete {
                schema: target.schema.clone(),
                table: entry.name.clone(),
                index_keys,
                referenced_by,
            },
            vec![plan],
        )))
    }

    pub fn bind_truncate(&self, truncate: &ast::Truncate) -> Result<LogicalOperator> {
        let (schema, entry) = self.resolve_target(&truncate.table, "truncate")?;
        self.require_table_privs(&schema, &entry.name, Privileges::TRUNCATE)?;

        let cascade = truncate.behavior == ast::DropBehavior::Cascade;
        let referenced_by = self.referenced_by(&schema, &entry)?;
        if !cascade {
            if let Some(other) = referenced_by
                .iter()
                .find(|r| r.table != entry.name || r.schema != schema)
            {
                return Err(DbError::invalid_input(format!(
                    "Cannot truncate '{}', it's referenced by '{}.{}', use CASCADE",
                    entry.name, other.schema, other.table
                ))
                .with_field("table", &entry.name)
                .with_field("constraint", &other.constraint));
            }
        }

        debug!(table = %entry.name, cascade, restart_identity = truncate.restart_identity, "bound truncate");

        Ok(LogicalOperator::Truncate(Node::leaf(LogicalTruncate {
            schema,
            table: entry.name.clone(),
            restart_identity: truncate.restart_identity,
            cascade,
            referenced_by,
        })))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::config::session::SessionIdentity;
    use crate::logical::binder::bind_ddl::testutil::{compile, run};
    use crate::logical::binder::bind_dml::testutil::{child, find};
    use crate::testutil::Fixture;
    use crate::types::datatype::DataType;

    fn delete(table: &str, where_expr: Option<ast::Expr>) -> Statement {
        Statement::Delete(ast::Delete {
            table: ast::ObjectReference::from(table),
            alias: None,
            where_expr,
        })
    }

    fn truncate(table: &str, behavior: ast::DropBehavior) -> Statement {
        Statement::Truncate(ast::Truncate {
            table: ast::ObjectReference::from(table),
            restart_identity: false,
            behavior,
        })
    }

    fn parent_and_child(fixture: &Fixture) {
        run(
            fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "parent",
                vec![ast::ColumnDef::new("id", ast::DataType::Integer).with_option(ast::ColumnOption::PrimaryKey)],
            )),
        )
        .unwrap();
        run(
            fixture,
            Statement::CreateTable(ast::CreateTable::new(
                "child",
                vec![
                    ast::ColumnDef::new("pid", ast::DataType::Integer).with_option(ast::ColumnOption::References {
                        table: ast::ObjectReference::from("parent"),
                        columns: Vec::new(),
                    }),
                ],
            )),
        )
        .unwrap();
    }

    #[test]
    fn delete_projects_row_id() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let compiled = compile(
            &fixture,
            delete("t", Some(ast::Expr::eq(ast::Expr::ident("a"), ast::Expr::number("1")))),
        )
        .unwrap();

        match child(&compiled.plan) {
            LogicalOperator::Project(project) => {
                assert_eq!(1, project.node.projections.len());
                assert_eq!(DataType::RowId, project.node.projections[0].datatype());
            }
            other => panic!("expected project, got {other:?}"),
        }
        assert!(find(&compiled.plan, &|op| matches!(op, LogicalOperator::Filter(_))).is_some());
    }

    #[test]
    fn delete_lists_referencing_tables_and_keys() {
        let fixture = Fixture::new();
        parent_and_child(&fixture);

        let compiled = compile(&fixture, delete("parent", None)).unwrap();
        match &compiled.plan {
            LogicalOperator::Delete(node) => {
                assert_eq!(1, node.node.referenced_by.len());
                assert_eq!("child", node.node.referenced_by[0].table);
                assert_eq!(1, node.node.index_keys.len());
                assert_eq!(1, node.node.index_keys[0].position);
            }
            other => panic!("expected delete, got {other:?}"),
        }
    }

    #[test]
    fn truncate_referenced_table() {
        let fixture = Fixture::new();
        parent_and_child(&fixture);

        let err = compile(&fixture, truncate("parent", ast::DropBehavior::Restrict)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        let compiled = compile(&fixture, truncate("parent", ast::DropBehavior::Cascade)).unwrap();
        match &compiled.plan {
            LogicalOperator::Truncate(node) => assert!(node.node.cascade),
            other => panic!("expected truncate, got {other:?}"),
        }

        compile(&fixture, truncate("child", ast::DropBehavior::Restrict)).unwrap();
    }

    #[test]
    fn delete_requires_privilege() {
        let mut fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        fixture.session = SessionIdentity::new("nobody", "public", "main");
        let err = compile(&fixture, delete("t", None)).unwrap_err();
        assert_eq!(ErrorKind::PrivilegeDenied, err.kind());
    }
}
