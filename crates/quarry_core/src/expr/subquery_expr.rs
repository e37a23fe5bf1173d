use std::fmt;

use super::Expression;
use super::comparison_expr::ComparisonOperator;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::logical::binder::bind_context::{BindScopeRef, CorrelatedColumn};
use crate::logical::operator::LogicalOperator;
use crate::types::datatype::DataType;

#[derive(Debug, Clone, PartialEq)]
pub enum SubqueryType {
    /// Single value. The plan is guarded to produce at most one row.
    Scalar,
    /// `[NOT] EXISTS`
    Exists { negated: bool },
    /// `<expr> <op> ANY (<subquery>)`, also used for IN.
    Any {
        expr: Box<Expression>,
        op: ComparisonOperator,
    },
    /// `<expr> <op> ALL (<subquery>)`
    All {
        expr: Box<Expression>,
        op: ComparisonOperator,
    },
}

/// A planned subquery embedded in an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    /// Scope the subquery was bound in.
    pub bind_scope: BindScopeRef,
    pub subquery: Box<LogicalOperator>,
    pub subquery_type: SubqueryType,
    pub return_type: DataType,
    /// Outer columns referenced from inside the subquery.
    pub correlated_columns: Vec<CorrelatedColumn>,
}

impl SubqueryExpr {
    /// If the plan references columns from outer scopes.
    pub fn is_correlated(&self) -> bool {
        !self.correlated_columns.is_empty()
    }
}

impl ContextDisplay for SubqueryExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.subquery_type {
            SubqueryType::Scalar => write!(f, "<SCALAR SUBQUERY {}>", self.bind_scope),
            SubqueryType::Exists { negated } => {
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "EXISTS <SUBQUERY {}>", self.bind_scope)
            }
            SubqueryType::Any { expr, op } => write!(
                f,
                "{} {op} ANY <SUBQUERY {}>",
                ContextDisplayWrapper::with_mode(expr.as_ref(), mode),
                self.bind_scope
            ),
            SubqueryType::All { expr, op } => write!(
                f,
                "{} {op} ALL <SUBQUERY {}>",
                ContextDisplayWrapper::with_mode(expr.as_ref(), mode),
                self.bind_scope
            ),
        }
    }
}
