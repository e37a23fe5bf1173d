use std::fmt;

use quarry_error::{DbError, Result};
use tracing::trace;

use super::Expression;
use super::literal_expr::LiteralExpr;
use super::variable_expr::ParameterExpr;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::types::cast::{can_cast, is_safe_cast};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub to: DataType,
    pub expr: Box<Expression>,
    /// Produce NULL instead of an error when a value can't be converted.
    pub try_cast: bool,
}

impl CastExpr {
    /// Create a new cast, erroring if no conversion between the types exists.
    ///
    /// If `expr` is itself a cast whose input converts safely to `to`, the
    /// inner cast is dropped and the input is cast directly.
    pub fn new(expr: impl Into<Expression>, to: DataType) -> Result<Self> {
        let expr = expr.into();

        let expr = match expr {
            Expression::Cast(inner) if !inner.try_cast && is_safe_cast(&inner.expr.datatype(), &to) => {
                trace!(from = %inner.to, %to, "flattening safe inner cast");
                inner.expr
            }
            other => Box::new(other),
        };

        let from = expr.datatype();
        if !can_cast(&from, &to) {
            return Err(DbError::type_mismatch(format!(
                "Cannot cast from {from} to {to}"
            ))
            .with_field("from", from)
            .with_field("to", &to));
        }

        Ok(CastExpr {
            to,
            expr,
            try_cast: false,
        })
    }

    pub fn new_try(expr: impl Into<Expression>, to: DataType) -> Result<Self> {
        let mut cast = Self::new(expr, to)?;
        cast.try_cast = true;
        Ok(cast)
    }
}

/// Coerce an expression to `target`.
///
/// Returns the expression untouched if it already has the target type, so
/// applying this twice with the same target adds no further casts. Untyped
/// NULL literals take on the target type directly.
pub fn check_type(target: &DataType, expr: Expression) -> Result<Expression> {
    let have = expr.datatype();
    if &have == target {
        return Ok(expr);
    }

    if let Expression::Literal(LiteralExpr {
        literal: ScalarValue::Null(_),
    }) = &expr
    {
        return Ok(Expression::Literal(LiteralExpr {
            literal: ScalarValue::Null(target.clone()),
        }));
    }

    // Parameters without a type from the caller take the type of their first
    // use.
    if let Expression::Parameter(param) = &expr {
        if param.datatype == DataType::Null {
            return Ok(Expression::Parameter(ParameterExpr {
                name: param.name.clone(),
                datatype: target.clone(),
            }));
        }
    }

    if !can_cast(&have, target) {
        return Err(DbError::type_mismatch(format!(
            "Expected an expression of type {target}, got {have}"
        ))
        .with_field("expected", target)
        .with_field("actual", have));
    }

    Ok(Expression::Cast(CastExpr::new(expr, target.clone())?))
}

impl ContextDisplay for CastExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = if self.try_cast { "TRY_CAST" } else { "CAST" };
        write!(
            f,
            "{name}({} TO {})",
            ContextDisplayWrapper::with_mode(self.expr.as_ref(), mode),
            self.to
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr;

    #[test]
    fn flatten_safe() {
        let cast = CastExpr::new(
            CastExpr::new(expr::lit(14_i32), DataType::Int64).unwrap(),
            DataType::decimal(20, 0),
        )
        .unwrap();

        assert_eq!(expr::lit(14_i32), *cast.expr);
        assert_eq!(DataType::decimal(20, 0), cast.to);
    }

    #[test]
    fn no_flatten_unsafe() {
        let cast = CastExpr::new(
            CastExpr::new(expr::lit(1.5_f64), DataType::Int32).unwrap(),
            DataType::Int64,
        )
        .unwrap();

        assert!(matches!(cast.expr.as_ref(), Expression::Cast(_)));
    }

    #[test]
    fn check_type_idempotent() {
        let once = check_type(&DataType::Int64, expr::lit(3_i32)).unwrap();
        let twice = check_type(&DataType::Int64, once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(DataType::Int64, twice.datatype());
    }

    #[test]
    fn check_type_null_takes_target() {
        let out = check_type(&DataType::UTF8, expr::lit(ScalarValue::null())).unwrap();
        assert_eq!(expr::lit(ScalarValue::Null(DataType::UTF8)), out);
    }

    #[test]
    fn check_type_mismatch() {
        let err = check_type(&DataType::Date32, expr::lit(true)).unwrap_err();
        assert_eq!(quarry_error::ErrorKind::TypeMismatch, err.kind());
    }
}
