//! Transaction control, variables, and procedure calls.
use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::bind_context::BindContext;
use super::column_binder::ErroringColumnBinder;
use super::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext, bind_datatype};
use super::scope_stack::ScopeEntry;
use crate::catalog::entry::CatalogEntryKind;
use crate::catalog::missing_entry_error;
use crate::compile::CompileContext;
use crate::expr::cast_expr::check_type;
use crate::expr::{self, Expression};
use crate::functions::FunctionKind;
use crate::logical::logical_call::LogicalCall;
use crate::logical::logical_session::{
    DeclaredVariable, IsolationLevel, LogicalDeclare, LogicalSetVariable, LogicalTransaction, SetTarget,
    TransactionOp,
};
use crate::logical::operator::{LogicalOperator, Node};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy)]
pub struct SessionBinder<'a> {
    pub ctx: &'a CompileContext<'a>,
}

impl<'a> SessionBinder<'a> {
    pub const fn new(ctx: &'a CompileContext<'a>) -> Self {
        SessionBinder { ctx }
    }

    pub fn bind_transaction(&self, stmt: &ast::TransactionStatement) -> Result<LogicalOperator> {
        let op = match stmt {
            ast::TransactionStatement::Start { isolation, read_only } => TransactionOp::Start {
                isolation: isolation.map(isolation_level),
                read_only: *read_only,
            },
            ast::TransactionStatement::Commit => TransactionOp::Commit,
            ast::TransactionStatement::Rollback { savepoint } => TransactionOp::Rollback {
                savepoint: savepoint.as_ref().map(|s| s.as_normalized_string()),
            },
            ast::TransactionStatement::Savepoint(name) => TransactionOp::Savepoint(name.as_normalized_string()),
            ast::TransactionStatement::Release(name) => TransactionOp::Release(name.as_normalized_string()),
            ast::TransactionStatement::SetTransaction { isolation, read_only } => {
                if isolation.is_none() && read_only.is_none() {
                    return Err(DbError::invalid_input(
                        "SET TRANSACTION needs an isolation level or access mode",
                    ));
                }
                TransactionOp::SetCharacteristics {
                    isolation: isolation.map(isolation_level),
                    read_only: *read_only,
                }
            }
        };

        debug!(%op, "bound transaction statement");
        Ok(LogicalOperator::Transaction(Node::leaf(LogicalTransaction { op })))
    }

    /// Declares each variable in the current frame, in order.
    pub fn bind_declare(&self, bind_context: &mut BindContext, declare: &ast::Declare) -> Result<LogicalOperator> {
        let mut variables = Vec::with_capacity(declare.variables.len());
        for var in &declare.variables {
            let name = var.name.as_normalized_string();
            let datatype = bind_datatype(self.ctx, &var.datatype)?;
            let initial = match &var.default {
                Some(default) => {
                    let value = self.bind_value(bind_context, default, "DECLARE", BindClause::Default)?;
                    check_type(&datatype, value)?
                }
                None => expr::lit(ScalarValue::Null(datatype.clone())),
            };

            bind_context.frames_mut().declare_variable(&name, datatype.clone())?;
            variables.push(DeclaredVariable {
                name,
                datatype,
                initial,
            });
        }

        Ok(LogicalOperator::Declare(Node::leaf(LogicalDeclare { variables })))
    }

    pub fn bind_set(&self, bind_context: &mut BindContext, set: &ast::SetStatement) -> Result<LogicalOperator> {
        let (target, value) = match set {
            ast::SetStatement::Variable { reference, value } => {
                let (target, datatype) = self.resolve_set_target(bind_context, reference)?;
                let value = self.bind_value(bind_context, value, "SET", BindClause::Set)?;
                (target, check_type(&datatype, value)?)
            }
            ast::SetStatement::Schema(name) => {
                let name = name.as_normalized_string();
                self.ctx.catalog.require_schema(&name)?;
                (SetTarget::Schema, expr::lit(name))
            }
            ast::SetStatement::Role(name) => {
                let name = name.as_normalized_string();
                if self.ctx.catalog.get_role(&name)?.is_none() {
                    return Err(missing_entry_error(self.ctx.catalog, None, CatalogEntryKind::Role, &name));
                }
                (SetTarget::Role, expr::lit(name))
            }
        };

        debug!(%target, "bound set");
        Ok(LogicalOperator::SetVariable(Node::leaf(LogicalSetVariable { target, value })))
    }

    pub fn bind_call(&self, bind_context: &mut BindContext, call: &ast::Call) -> Result<LogicalOperator> {
        let (schema, name) = call.reference.schema_and_name()?;

        let args = call
            .args
            .iter()
            .map(|arg| self.bind_value(bind_context, arg, "CALL", BindClause::Call))
            .collect::<Result<Vec<_>>>()?;
        let types: Vec<_> = args.iter().map(|a| a.datatype()).collect();

        let functions = self.ctx.functions();
        let (schema, _) = functions.find_set(schema.as_deref(), &name)?;
        let procedure = functions
            .resolve_overload(Some(&schema), &name, &types, FunctionKind::Procedure)?
            .plan(args)?;

        debug!(%schema, procedure = procedure.name, "bound call");
        Ok(LogicalOperator::Call(Node::leaf(LogicalCall { schema, procedure })))
    }

    /// Find what `SET <reference>` assigns to, along with the type values are
    /// cast to.
    ///
    /// Unqualified names are searched in declared variables, then session
    /// variables, then compiler settings.
    fn resolve_set_target(
        &self,
        bind_context: &BindContext,
        reference: &ast::ObjectReference,
    ) -> Result<(SetTarget, DataType)> {
        let (schema, name) = reference.schema_and_name()?;
        let system = &self.ctx.config.default_schema_fallback;

        match &schema {
            None => {
                if let Some(ScopeEntry::Variable { datatype }) = bind_context.frames().resolve_local(&name) {
                    return Ok((SetTarget::Local(name), datatype));
                }
            }
            Some(schema) if schema == system => (),
            Some(schema) => {
                return Err(DbError::invalid_input(format!(
                    "Session variables live in '{system}', not '{schema}'"
                ))
                .with_field("variable", &name));
            }
        }

        if let Some(datatype) = bind_context.frames().resolve_global(&name) {
            return Ok((SetTarget::Global(name), datatype));
        }
        if let Ok(current) = self.ctx.config.get_as_scalar(&name) {
            return Ok((SetTarget::Setting(name), current.datatype()));
        }

        Err(DbError::not_found(format!("Unknown variable '{name}'")).with_field("variable", name))
    }

    fn bind_value(
        &self,
        bind_context: &mut BindContext,
        value: &ast::Expr,
        clause: &'static str,
        bind_clause: BindClause,
    ) -> Result<Expression> {
        let scope = bind_context.new_orphan_scope();
        BaseExpressionBinder::new(scope, self.ctx).bind_expression(
            bind_context,
            value,
            &mut ErroringColumnBinder::new(clause),
            RecursionContext::new(bind_clause),
        )
    }
}

const fn isolation_level(level: ast::IsolationLevel) -> IsolationLevel {
    match level {
        ast::IsolationLevel::ReadUncommitted => IsolationLevel::ReadUncommitted,
        ast::IsolationLevel::ReadCommitted => IsolationLevel::ReadCommitted,
        ast::IsolationLevel::RepeatableRead => IsolationLevel::RepeatableRead,
        ast::IsolationLevel::Serializable => IsolationLevel::Serializable,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_ddl::testutil::compile;
    use crate::testutil::Fixture;

    #[test]
    fn transaction_statements() {
        let fixture = Fixture::new();
        let compiled = compile(
            &fixture,
            Statement::Transaction(ast::TransactionStatement::Rollback {
                savepoint: Some(ast::Ident::new("SP1")),
            }),
        )
        .unwrap();
        match &compiled.plan {
            LogicalOperator::Transaction(node) => assert_eq!(
                TransactionOp::Rollback {
                    savepoint: Some("sp1".to_string())
                },
                node.node.op
            ),
            other => panic!("expected transaction, got {other:?}"),
        }

        let err = compile(
            &fixture,
            Statement::Transaction(ast::TransactionStatement::SetTransaction {
                isolation: None,
                read_only: None,
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn declare_casts_default() {
        let fixture = Fixture::new();
        let compiled = compile(
            &fixture,
            Statement::Declare(ast::Declare {
                variables: vec![
                    ast::VariableDeclaration {
                        name: ast::Ident::new("a"),
                        datatype: ast::DataType::BigInt,
                        default: Some(ast::Expr::number(1)),
                    },
                    ast::VariableDeclaration {
                        name: ast::Ident::new("b"),
                        datatype: ast::DataType::Integer,
                        default: None,
                    },
                ],
            }),
        )
        .unwrap();
        match &compiled.plan {
            LogicalOperator::Declare(node) => {
                assert_eq!(DataType::Int64, node.node.variables[0].initial.datatype());
                assert_eq!(expr::lit(ScalarValue::Null(DataType::Int32)), node.node.variables[1].initial);
            }
            other => panic!("expected declare, got {other:?}"),
        }
    }

    #[test]
    fn declare_twice_in_one_statement() {
        let fixture = Fixture::new();
        let var = ast::VariableDeclaration {
            name: ast::Ident::new("a"),
            datatype: ast::DataType::Integer,
            default: None,
        };
        let err = compile(
            &fixture,
            Statement::Declare(ast::Declare {
                variables: vec![var.clone(), var],
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn set_setting_and_unknown() {
        let fixture = Fixture::new();
        let compiled = compile(
            &fixture,
            Statement::Set(ast::SetStatement::Variable {
                reference: ast::ObjectReference::from("verify_plans"),
                value: ast::Expr::boolean(false),
            }),
        )
        .unwrap();
        match &compiled.plan {
            LogicalOperator::SetVariable(node) => {
                assert_eq!(SetTarget::Setting("verify_plans".to_string()), node.node.target);
            }
            other => panic!("expected set, got {other:?}"),
        }

        let err = compile(
            &fixture,
            Statement::Set(ast::SetStatement::Variable {
                reference: ast::ObjectReference::from("no_such_thing"),
                value: ast::Expr::number(1),
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn set_schema_must_exist() {
        let fixture = Fixture::new();
        compile(&fixture, Statement::Set(ast::SetStatement::Schema(ast::Ident::new("main")))).unwrap();
        let err = compile(&fixture, Statement::Set(ast::SetStatement::Schema(ast::Ident::new("nope")))).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn call_procedure() {
        let fixture = Fixture::new().with_table("t", &[("a", DataType::Int32)]);
        let compiled = compile(
            &fixture,
            Statement::Call(ast::Call {
                reference: ast::ObjectReference::from("vacuum"),
                args: vec![ast::Expr::string("t")],
            }),
        )
        .unwrap();
        match &compiled.plan {
            LogicalOperator::Call(node) => {
                assert_eq!("vacuum", node.node.procedure.name);
                assert_eq!("sys", node.node.schema);
            }
            other => panic!("expected call, got {other:?}"),
        }

        // Scalars can't be called.
        let err = compile(
            &fixture,
            Statement::Call(ast::Call {
                reference: ast::ObjectReference::from("abs"),
                args: vec![ast::Expr::number(1)],
            }),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }
}
