use quarry_ast::statement::{self, Statement};
use quarry_error::{DbError, Result};
use tracing::trace;

use super::bind_context::BindContext;
use super::bind_ddl::DdlBinder;
use super::bind_dml::DmlBinder;
use super::bind_query::plan_query;
use super::bind_session::SessionBinder;
use crate::compile::{CompileContext, StatementKind};
use crate::explain::node::{ExplainFormat, ExplainNode};
use crate::logical::logical_explain::LogicalExplain;
use crate::logical::operator::{LogicalOperator, Node};
use crate::types::datatype::DataType;

/// Binds and plans any statement, dispatching to the binder for its
/// category.
#[derive(Debug, Clone, Copy)]
pub struct StatementBinder<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> StatementBinder<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        StatementBinder { ctx }
    }

    pub fn bind(&self, bind_context: &mut BindContext, stmt: &Statement) -> Result<(LogicalOperator, StatementKind)> {
        let ddl = DdlBinder::new(self.ctx);
        let dml = DmlBinder::new(self.ctx);
        let session = SessionBinder::new(self.ctx);

        let bound = match stmt {
            Statement::Query(query) => {
                let root = bind_context.root_scope_ref();
                (plan_query(self.ctx, bind_context, root, query)?, StatementKind::Table)
            }

            Statement::CreateSchema(create) => (ddl.bind_create_schema(create)?, StatementKind::Schema),
            Statement::CreateTable(create) => (ddl.bind_create_table(bind_context, create)?, StatementKind::Schema),
            Statement::CreateView(create) => (ddl.bind_create_view(bind_context, create)?, StatementKind::Schema),
            Statement::CreateType(create) => (ddl.bind_create_type(create)?, StatementKind::Schema),
            Statement::CreateIndex(create) => (ddl.bind_create_index(create)?, StatementKind::Schema),
            Statement::CreateSequence(create) => (ddl.bind_create_sequence(create)?, StatementKind::Schema),
            Statement::CreateUser(create) => (ddl.bind_create_user(create)?, StatementKind::Schema),
            Statement::CreateRole(create) => (ddl.bind_create_role(create)?, StatementKind::Schema),
            Statement::AlterTable(alter) => (ddl.bind_alter_table(bind_context, alter)?, StatementKind::Schema),
            Statement::AlterSequence(alter) => (ddl.bind_alter_sequence(alter)?, StatementKind::Schema),
            Statement::AlterSchema(alter) => (ddl.bind_alter_schema(alter)?, StatementKind::Schema),
            Statement::AlterUser(alter) => (ddl.bind_alter_user(alter)?, StatementKind::Schema),
            Statement::Drop(drop) => (ddl.bind_drop(drop)?, StatementKind::Schema),
            Statement::Grant(grant) => (ddl.bind_grant(grant)?, StatementKind::Schema),
            Statement::Revoke(revoke) => (ddl.bind_revoke(revoke)?, StatementKind::Schema),

            Statement::Insert(insert) => (dml.bind_insert(bind_context, insert)?, StatementKind::Update),
            Statement::Update(update) => (dml.bind_update(bind_context, update)?, StatementKind::Update),
            Statement::Delete(delete) => (dml.bind_delete(bind_context, delete)?, StatementKind::Update),
            Statement::Merge(merge) => (dml.bind_merge(bind_context, merge)?, StatementKind::Update),
            Statement::Truncate(truncate) => (dml.bind_truncate(truncate)?, StatementKind::Update),
            Statement::CopyFrom(copy) => (dml.bind_copy_from(bind_context, copy)?, StatementKind::Update),
            Statement::CopyTo(copy) => (dml.bind_copy_to(bind_context, copy)?, StatementKind::Update),

            Statement::Transaction(txn) => (session.bind_transaction(txn)?, StatementKind::Transaction),
            Statement::Declare(declare) => (session.bind_declare(bind_context, declare)?, StatementKind::Transaction),
            Statement::Set(set) => (session.bind_set(bind_context, set)?, StatementKind::Transaction),
            Statement::Call(call) => (session.bind_call(bind_context, call)?, StatementKind::Update),

            Statement::Explain {
                analyze,
                verbose,
                format,
                body,
            } => {
                if matches!(body.as_ref(), Statement::Explain { .. }) {
                    return Err(DbError::invalid_input("EXPLAIN can't be nested"));
                }
                let (plan, _) = self.bind(bind_context, body)?;
                let format = match format {
                    statement::ExplainFormat::Text => ExplainFormat::Text,
                    statement::ExplainFormat::Json => ExplainFormat::Json,
                };
                let rendered = ExplainNode::new_from_logical(*verbose, bind_context, &plan).format(format)?;

                // Created after binding the body so the body's table refs
                // match those of the same statement without EXPLAIN.
                let table_ref = bind_context.new_ephemeral_table_with_columns(
                    vec![DataType::UTF8, DataType::UTF8],
                    vec!["plan_type".to_string(), "plan".to_string()],
                )?;

                let explain = LogicalExplain {
                    analyze: *analyze,
                    verbose: *verbose,
                    format,
                    rendered,
                    table_ref,
                };
                (LogicalOperator::Explain(Node::new(explain, vec![plan])), StatementKind::Table)
            }
        };

        trace!(kind = %bound.1, "bound statement");
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::ast;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_ddl::testutil::compile;
    use crate::testutil::Fixture;

    fn select_a() -> Statement {
        Statement::Query(ast::QueryNode::select(
            ast::SelectNode::new(vec![ast::SelectExpr::Expr(ast::Expr::ident("a"))]).from(ast::FromNode::table("t")),
        ))
    }

    #[test]
    fn statement_kinds() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);

        assert_eq!(StatementKind::Table, compile(&fixture, select_a()).unwrap().kind);
        assert_eq!(
            StatementKind::Schema,
            compile(
                &fixture,
                Statement::CreateSchema(ast::CreateSchema {
                    if_not_exists: false,
                    name: ast::Ident::new("s2"),
                    authorization: None,
                })
            )
            .unwrap()
            .kind
        );
        assert_eq!(
            StatementKind::Update,
            compile(
                &fixture,
                Statement::Delete(ast::Delete {
                    table: ast::ObjectReference::from("t"),
                    alias: None,
                    where_expr: None,
                })
            )
            .unwrap()
            .kind
        );
        assert_eq!(
            StatementKind::Transaction,
            compile(&fixture, Statement::Transaction(ast::TransactionStatement::Commit))
                .unwrap()
                .kind
        );
    }

    #[test]
    fn explain_renders_body() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let compiled = compile(&fixture, Statement::explain(select_a())).unwrap();

        assert_eq!(StatementKind::Table, compiled.kind);
        match &compiled.plan {
            LogicalOperator::Explain(node) => {
                assert!(node.node.rendered.contains("Scan"), "{}", node.node.rendered);
                assert_eq!(1, node.children.len());
            }
            other => panic!("expected explain, got {other:?}"),
        }
        let names: Vec<_> = compiled.output_columns().unwrap().into_iter().map(|(name, _)| name).collect();
        assert_eq!(vec!["plan_type".to_string(), "plan".to_string()], names);
    }

    #[test]
    fn nested_explain() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let err = compile(&fixture, Statement::explain(Statement::explain(select_a()))).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }
}
