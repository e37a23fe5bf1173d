use super::datatype::{DataType, TypeClass};

/// Check if an explicit cast from `from` to `to` exists.
pub fn can_cast(from: &DataType, to: &DataType) -> bool {
    if from == to || from.is_null() {
        return true;
    }

    let from_class = from.type_class();
    let to_class = to.type_class();

    match (from_class, to_class) {
        // Everything goes to and from strings, except row constructors.
        (TypeClass::Struct, _) | (_, TypeClass::Struct) => match (from, to) {
            (DataType::Struct(a), DataType::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((_, a), (_, b))| can_cast(a, b))
            }
            _ => false,
        },
        (TypeClass::String, _) | (_, TypeClass::String) => true,

        (
            TypeClass::Numeric | TypeClass::Decimal | TypeClass::Approximate,
            TypeClass::Numeric | TypeClass::Decimal | TypeClass::Approximate,
        ) => true,
        (TypeClass::Boolean, TypeClass::Numeric) | (TypeClass::Numeric, TypeClass::Boolean) => {
            true
        }

        (TypeClass::Temporal, TypeClass::Temporal) => !matches!(
            (from, to),
            (DataType::Time64, DataType::Date32) | (DataType::Date32, DataType::Time64)
        ),
        (TypeClass::Interval, TypeClass::Interval) => from == to,
        (TypeClass::Blob, TypeClass::Blob) => true,

        _ => false,
    }
}

/// Check if casting from `from` to `to` never loses information.
///
/// Chains of safe casts can be collapsed into a single cast to the final
/// type.
pub fn is_safe_cast(from: &DataType, to: &DataType) -> bool {
    if from == to || from.is_null() {
        return true;
    }

    match (from, to) {
        (a, b) if a.is_exact_numeric() && b.is_exact_numeric() => {
            match (a.exact_digits(), b.exact_digits()) {
                (Some((a_prec, a_scale)), Some((b_prec, b_scale))) => {
                    let a_int = a_prec as i16 - a_scale as i16;
                    let b_int = b_prec as i16 - b_scale as i16;
                    b_int >= a_int && b_scale >= a_scale
                }
                _ => false,
            }
        }
        (DataType::Float32, DataType::Float64) => true,
        (a, DataType::Float64) if a.is_exact_numeric() => {
            a.exact_digits().map(|(p, _)| p <= 15).unwrap_or(false)
        }
        (a, DataType::Float32) if a.is_exact_numeric() => {
            a.exact_digits().map(|(p, _)| p <= 7).unwrap_or(false)
        }
        (DataType::Utf8 { max_length: a }, DataType::Utf8 { max_length: b }) => match (a, b) {
            (_, None) => true,
            (Some(a), Some(b)) => a <= b,
            (None, Some(_)) => false,
        },
        (DataType::Date32, DataType::Timestamp { .. }) => true,
        (DataType::Timestamp { with_tz: false }, DataType::Timestamp { with_tz: true }) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::datatype::DecimalTypeMeta;

    #[test]
    fn explicit_casts() {
        assert!(can_cast(&DataType::Int32, &DataType::UTF8));
        assert!(can_cast(&DataType::UTF8, &DataType::Date32));
        assert!(can_cast(&DataType::Float64, &DataType::Int8));
        assert!(!can_cast(&DataType::Date32, &DataType::Int32));
        assert!(!can_cast(&DataType::Binary, &DataType::Boolean));
    }

    #[test]
    fn safe_casts() {
        assert!(is_safe_cast(&DataType::Int16, &DataType::Int64));
        assert!(is_safe_cast(
            &DataType::Int32,
            &DataType::Decimal64(DecimalTypeMeta::new(12, 2))
        ));
        assert!(!is_safe_cast(
            &DataType::Int64,
            &DataType::Decimal64(DecimalTypeMeta::new(12, 2))
        ));
        assert!(!is_safe_cast(&DataType::Int64, &DataType::Int32));
        assert!(is_safe_cast(&DataType::varchar(4), &DataType::varchar(8)));
    }
}
