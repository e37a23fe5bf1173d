use quarry_error::{DbError, Result};

use super::datatype::{DECIMAL_MAX_PRECISION, DataType, StructTypeMeta};

/// Compute the smallest type both `a` and `b` can be losslessly coerced to.
///
/// Null unifies with anything.
pub fn supertype(a: &DataType, b: &DataType) -> Result<DataType> {
    if a == b {
        return Ok(a.clone());
    }

    match (a, b) {
        (DataType::Null, other) | (other, DataType::Null) => Ok(other.clone()),

        (DataType::Utf8 { max_length: a_len }, DataType::Utf8 { max_length: b_len }) => {
            let max_length = match (a_len, b_len) {
                (Some(a), Some(b)) => Some(*a.max(b)),
                _ => None,
            };
            Ok(DataType::Utf8 { max_length })
        }

        // Row ids are plain 64-bit integers to everything outside the scan.
        (DataType::RowId, other) | (other, DataType::RowId) if other.is_integer() => {
            supertype(&DataType::Int64, other)
        }

        (a, b) if a.is_integer() && b.is_integer() => {
            // Both exact with scale 0, the wider integer wins.
            let (a_digits, _) = exact_digits(a)?;
            let (b_digits, _) = exact_digits(b)?;
            Ok(if a_digits >= b_digits {
                a.clone()
            } else {
                b.clone()
            })
        }

        (a, b) if a.is_exact_numeric() && b.is_exact_numeric() => {
            let (a_prec, a_scale) = exact_digits(a)?;
            let (b_prec, b_scale) = exact_digits(b)?;
            let int_digits = (a_prec as i16 - a_scale as i16).max(b_prec as i16 - b_scale as i16);
            let scale = a_scale.max(b_scale);
            let precision = (int_digits + scale as i16).min(DECIMAL_MAX_PRECISION as i16);
            Ok(DataType::decimal(precision as u8, scale))
        }

        (a, b) if a.is_float() && b.is_float() => {
            let a_width = a.float_width().unwrap_or(8);
            let b_width = b.float_width().unwrap_or(8);
            Ok(if a_width >= b_width {
                a.clone()
            } else {
                b.clone()
            })
        }

        // Mixed exact/approximate widens to approximate. A Float32 only holds
        // ~7 significant digits, wider exact inputs go to Float64.
        (exact, float) | (float, exact) if exact.is_exact_numeric() && float.is_float() => {
            let (digits, _) = exact_digits(exact)?;
            if matches!(float, DataType::Float64) || digits > 7 {
                Ok(DataType::Float64)
            } else {
                Ok(DataType::Float32)
            }
        }

        (DataType::Date32, DataType::Timestamp { with_tz })
        | (DataType::Timestamp { with_tz }, DataType::Date32) => {
            Ok(DataType::Timestamp { with_tz: *with_tz })
        }

        (DataType::Timestamp { .. }, DataType::Timestamp { .. }) => {
            Ok(DataType::Timestamp { with_tz: true })
        }

        (DataType::Struct(a_meta), DataType::Struct(b_meta)) => {
            if a_meta.fields.len() != b_meta.fields.len() {
                return Err(DbError::arity_mismatch(format!(
                    "Row constructors have different number of fields: {} and {}",
                    a_meta.fields.len(),
                    b_meta.fields.len()
                )));
            }
            let fields = a_meta
                .fields
                .iter()
                .zip(&b_meta.fields)
                .map(|((name, a), (_, b))| Ok((name.clone(), supertype(a, b)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(DataType::Struct(StructTypeMeta { fields }))
        }

        (a, b) => Err(mismatch(a, b)),
    }
}

/// Fold `supertype` over a list of types.
///
/// Returns Null for an empty list or a list of only nulls.
pub fn supertype_of<'a>(types: impl IntoIterator<Item = &'a DataType>) -> Result<DataType> {
    let mut curr = DataType::Null;
    for typ in types {
        curr = supertype(&curr, typ)?;
    }
    Ok(curr)
}

fn exact_digits(typ: &DataType) -> Result<(u8, i8)> {
    typ.exact_digits()
        .ok_or_else(|| DbError::new(format!("Expected exact numeric type, got {typ}")))
}

fn mismatch(a: &DataType, b: &DataType) -> DbError {
    DbError::type_mismatch(format!("No common type for {a} and {b}"))
        .with_field("left", a)
        .with_field("right", b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::datatype::{DecimalTypeMeta, IntervalClass};

    #[test]
    fn null_unifies() {
        assert_eq!(
            DataType::Int32,
            supertype(&DataType::Null, &DataType::Int32).unwrap()
        );
        assert_eq!(
            DataType::Int32,
            supertype(&DataType::Int32, &DataType::Null).unwrap()
        );
    }

    #[test]
    fn strings_widen() {
        assert_eq!(
            DataType::varchar(20),
            supertype(&DataType::varchar(10), &DataType::varchar(20)).unwrap()
        );
        assert_eq!(
            DataType::UTF8,
            supertype(&DataType::varchar(10), &DataType::UTF8).unwrap()
        );
    }

    #[test]
    fn int_and_decimal() {
        // Int32 is 10 integer digits, decimal(2,1) has 1 integer digit.
        let typ = supertype(
            &DataType::Int32,
            &DataType::Decimal64(DecimalTypeMeta::new(2, 1)),
        )
        .unwrap();
        assert_eq!(DataType::Decimal64(DecimalTypeMeta::new(11, 1)), typ);
    }

    #[test]
    fn decimal_clamped() {
        let typ = supertype(
            &DataType::Int128,
            &DataType::Decimal64(DecimalTypeMeta::new(10, 5)),
        )
        .unwrap();
        assert_eq!(DataType::Decimal128(DecimalTypeMeta::new(38, 5)), typ);
    }

    #[test]
    fn exact_and_float() {
        assert_eq!(
            DataType::Float32,
            supertype(&DataType::Int16, &DataType::Float32).unwrap()
        );
        assert_eq!(
            DataType::Float64,
            supertype(&DataType::Int64, &DataType::Float32).unwrap()
        );
    }

    #[test]
    fn intervals_must_match_class() {
        let err = supertype(
            &DataType::Interval(IntervalClass::YearMonth),
            &DataType::Interval(IntervalClass::DayTime),
        )
        .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn no_common_type() {
        let err = supertype(&DataType::Boolean, &DataType::Int32).unwrap_err();
        assert_eq!(quarry_error::ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn fold_types() {
        let typ = supertype_of(&[DataType::Null, DataType::Int16, DataType::Int64]).unwrap();
        assert_eq!(DataType::Int64, typ);
    }
}
