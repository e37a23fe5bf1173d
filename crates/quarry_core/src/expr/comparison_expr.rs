use std::fmt;

use quarry_ast::ast;
use quarry_error::{DbError, Result};

use super::Expression;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    IsDistinctFrom,
    IsNotDistinctFrom,
}

impl ComparisonOperator {
    /// The operator producing the opposite result for non-null inputs.
    pub const fn negate(self) -> Self {
        match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Lt => Self::GtEq,
            Self::LtEq => Self::Gt,
            Self::Gt => Self::LtEq,
            Self::GtEq => Self::Lt,
            Self::IsDistinctFrom => Self::IsNotDistinctFrom,
            Self::IsNotDistinctFrom => Self::IsDistinctFrom,
        }
    }

    /// The operator to use when the operands are swapped.
    pub const fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
            other => other,
        }
    }

    pub fn try_from_ast(op: ast::BinaryOperator) -> Result<Self> {
        Ok(match op {
            ast::BinaryOperator::Eq => Self::Eq,
            ast::BinaryOperator::NotEq => Self::NotEq,
            ast::BinaryOperator::Lt => Self::Lt,
            ast::BinaryOperator::LtEq => Self::LtEq,
            ast::BinaryOperator::Gt => Self::Gt,
            ast::BinaryOperator::GtEq => Self::GtEq,
            other => {
                return Err(DbError::invalid_input(format!(
                    "Not a comparison operator: {other:?}"
                )));
            }
        })
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
            Self::IsDistinctFrom => write!(f, "IS DISTINCT FROM"),
            Self::IsNotDistinctFrom => write!(f, "IS NOT DISTINCT FROM"),
        }
    }
}

/// A comparison between two operands of the same type.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub op: ComparisonOperator,
}

impl ContextDisplay for ComparisonExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            ContextDisplayWrapper::with_mode(self.left.as_ref(), mode),
            self.op,
            ContextDisplayWrapper::with_mode(self.right.as_ref(), mode),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_twice_is_identity() {
        let ops = [
            ComparisonOperator::Eq,
            ComparisonOperator::NotEq,
            ComparisonOperator::Lt,
            ComparisonOperator::LtEq,
            ComparisonOperator::Gt,
            ComparisonOperator::GtEq,
            ComparisonOperator::IsDistinctFrom,
            ComparisonOperator::IsNotDistinctFrom,
        ];
        for op in ops {
            assert_eq!(op, op.negate().negate());
        }
    }

    #[test]
    fn flip_ordering() {
        assert_eq!(ComparisonOperator::Gt, ComparisonOperator::Lt.flip());
        assert_eq!(ComparisonOperator::Eq, ComparisonOperator::Eq.flip());
    }
}
