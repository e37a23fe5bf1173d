//! Precision and scale rules for decimal arithmetic.
//!
//! Operands are rescaled before overload resolution so the arithmetic kernels
//! only ever see decimals of a matching shape.
use super::DecimalOp;
use crate::types::datatype::{DECIMAL_MAX_PRECISION, DataType, DecimalTypeMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// An exact numeric operand, with the digit count to use for literals.
#[derive(Debug, Clone, Copy)]
pub struct DecimalOperand<'a> {
    pub datatype: &'a DataType,
    /// Digits of an integer literal. Overrides the digits implied by the
    /// type.
    pub literal_digits: Option<u8>,
}

impl DecimalOperand<'_> {
    fn precision_scale(&self) -> Option<(u8, i8)> {
        match (self.datatype.is_integer(), self.literal_digits) {
            (true, Some(digits)) => Some((digits, 0)),
            _ => self.datatype.exact_digits(),
        }
    }
}

/// Compute the types both operands should be cast to before resolving the
/// operator.
///
/// Returns None when the policy doesn't apply (not a decimal operation).
pub fn rescale_operands(
    op: ArithOp,
    left: DecimalOperand,
    right: DecimalOperand,
) -> Option<(DataType, DataType)> {
    if !(left.datatype.is_decimal() || right.datatype.is_decimal()) {
        return None;
    }
    if !(left.datatype.is_exact_numeric() && right.datatype.is_exact_numeric()) {
        return None;
    }

    let (p1, s1) = left.precision_scale()?;
    let (p2, s2) = right.precision_scale()?;

    match op {
        ArithOp::Add | ArithOp::Sub | ArithOp::Rem => {
            let int_digits = (p1 as i16 - s1 as i16).max(p2 as i16 - s2 as i16);
            let scale = s1.max(s2);
            let precision = int_digits + scale as i16 + 1;
            let typ = decimal_clamped(precision, scale);
            Some((typ.clone(), typ))
        }
        ArithOp::Mul => Some((decimal_clamped(p1 as i16, s1), decimal_clamped(p2 as i16, s2))),
        ArithOp::Div => Some((
            decimal_clamped(p1 as i16 + s2 as i16, s1 + s2),
            decimal_clamped(p2 as i16, s2),
        )),
    }
}

/// Result type of a decimal operation on already rescaled operands.
pub fn arith_result(op: DecimalOp, left: DecimalTypeMeta, right: DecimalTypeMeta) -> DataType {
    match op {
        DecimalOp::Mul => decimal_clamped(
            left.precision as i16 + right.precision as i16,
            left.scale.saturating_add(right.scale),
        ),
        DecimalOp::Div => decimal_clamped(left.precision as i16, (left.scale - right.scale).max(0)),
    }
}

fn decimal_clamped(precision: i16, scale: i8) -> DataType {
    let precision = precision.clamp(1, DECIMAL_MAX_PRECISION as i16) as u8;
    let scale = scale.clamp(0, precision as i8);
    DataType::decimal(precision, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(p: u8, s: i8) -> DataType {
        DataType::decimal(p, s)
    }

    #[test]
    fn add_literal_int_and_decimal() {
        let one = DataType::Int32;
        let one_five = dec(2, 1);
        let (l, r) = rescale_operands(
            ArithOp::Add,
            DecimalOperand {
                datatype: &one,
                literal_digits: Some(1),
            },
            DecimalOperand {
                datatype: &one_five,
                literal_digits: None,
            },
        )
        .unwrap();
        assert_eq!(dec(3, 1), l);
        assert_eq!(dec(3, 1), r);
    }

    #[test]
    fn add_column_int_and_decimal() {
        let col = DataType::Int32;
        let d = dec(5, 2);
        let (l, _) = rescale_operands(
            ArithOp::Sub,
            DecimalOperand {
                datatype: &col,
                literal_digits: None,
            },
            DecimalOperand {
                datatype: &d,
                literal_digits: None,
            },
        )
        .unwrap();
        // 10 integer digits + 2 scale + 1
        assert_eq!(dec(13, 2), l);
    }

    #[test]
    fn mul_result() {
        let typ = arith_result(
            DecimalOp::Mul,
            DecimalTypeMeta::new(5, 2),
            DecimalTypeMeta::new(4, 1),
        );
        assert_eq!(dec(9, 3), typ);

        let typ = arith_result(
            DecimalOp::Mul,
            DecimalTypeMeta::new(30, 2),
            DecimalTypeMeta::new(30, 1),
        );
        assert_eq!(dec(38, 3), typ);
    }

    #[test]
    fn div_keeps_dividend_scale() {
        let a = dec(6, 2);
        let b = dec(4, 1);
        let (l, r) = rescale_operands(
            ArithOp::Div,
            DecimalOperand {
                datatype: &a,
                literal_digits: None,
            },
            DecimalOperand {
                datatype: &b,
                literal_digits: None,
            },
        )
        .unwrap();
        assert_eq!(dec(7, 3), l);
        let result = arith_result(
            DecimalOp::Div,
            l.decimal_meta().unwrap(),
            r.decimal_meta().unwrap(),
        );
        assert_eq!(dec(7, 2), result);
    }

    #[test]
    fn not_decimal() {
        let a = DataType::Int32;
        assert!(
            rescale_operands(
                ArithOp::Add,
                DecimalOperand {
                    datatype: &a,
                    literal_digits: None
                },
                DecimalOperand {
                    datatype: &a,
                    literal_digits: None
                },
            )
            .is_none()
        );
    }
}
