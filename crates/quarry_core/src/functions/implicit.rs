use crate::types::datatype::DataTypeId;

/// Score that should be used if no cast is needed.
pub const NO_CAST_SCORE: u32 = 800;

/// Score for an argument matching an `Any` parameter.
pub const ANY_SCORE: u32 = 100;

/// Bonus for casts that stay within a type class (Int16 -> Int32).
pub const SAME_CLASS_SCORE: u32 = 300;

/// Small bonus for casting decimals to floats over other cross class casts.
pub const DECIMAL_TO_FLOAT_BONUS: u32 = 10;

const FROM_STRING_CAST_SCORE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplicitCastConfig {
    /// Allow implicit casting from strings.
    pub allow_from_utf8: bool,
    /// Allow implicit casting to strings.
    pub allow_to_utf8: bool,
}

impl ImplicitCastConfig {
    /// Cast config used for function arguments.
    pub const FUNCTION: Self = Self {
        allow_from_utf8: true,
        allow_to_utf8: false,
    };

    /// Cast config to use for unions (and other set ops).
    ///
    /// Types for unions must fit into well-known domains.
    pub const UNION: Self = Self {
        allow_to_utf8: false,
        allow_from_utf8: false,
    };
}

/// Return the score for casting from `have` to `want`.
///
/// Returns None if there's not a valid implicit cast.
///
/// A higher score indicates a more preferred cast. Narrower targets score
/// higher than wider ones so that `Int16` arguments prefer an `Int32`
/// overload to an `Int64` one.
pub const fn implicit_cast_score(
    have: DataTypeId,
    want: DataTypeId,
    conf: ImplicitCastConfig,
) -> Option<u32> {
    match have {
        // Cast NULL to anything.
        DataTypeId::Null => return Some(target_score(want)),
        // Simple integer casts.
        DataTypeId::Int8 => return int8_cast_score(want, conf),
        DataTypeId::Int16 => return int16_cast_score(want, conf),
        DataTypeId::Int32 => return int32_cast_score(want, conf),
        DataTypeId::Int64 | DataTypeId::RowId => return int64_cast_score(want, conf),
        DataTypeId::Int128 => return int128_cast_score(want, conf),

        // Float casts
        DataTypeId::Float32 => return float32_cast_score(want, conf),
        DataTypeId::Float64 => return float64_cast_score(want, conf),

        // Decimal casts
        DataTypeId::Decimal64 => return decimal64_cast_score(want, conf),
        DataTypeId::Decimal128 => return decimal128_cast_score(want, conf),

        DataTypeId::Date32 => {
            return match want {
                DataTypeId::Timestamp => Some(target_score(want)),
                DataTypeId::Utf8 if conf.allow_to_utf8 => Some(target_score(want)),
                _ => None,
            };
        }

        // String casts
        DataTypeId::Utf8 if conf.allow_from_utf8 => match want {
            DataTypeId::Int8
            | DataTypeId::Int16
            | DataTypeId::Int32
            | DataTypeId::Int64
            | DataTypeId::Int128
            | DataTypeId::Float32
            | DataTypeId::Float64
            | DataTypeId::Decimal64
            | DataTypeId::Decimal128
            | DataTypeId::Date32
            | DataTypeId::Time64
            | DataTypeId::Interval
            | DataTypeId::Timestamp => return Some(FROM_STRING_CAST_SCORE),

            // Non-zero since it's a valid cast, just we would prefer something
            // else.
            DataTypeId::Utf8 => return Some(1),
            _ => (),
        },
        _ => (),
    }

    // No valid cast found.
    None
}

/// Determine the score for the target type we can cast to.
///
/// More "specific" types will have a higher target score.
pub const fn target_score(target: DataTypeId) -> u32 {
    match target {
        DataTypeId::Int8 => 191,
        DataTypeId::Int16 => 181,
        DataTypeId::Int32 => 171,
        DataTypeId::Int64 => 161,
        DataTypeId::Int128 => 156,
        DataTypeId::Float32 => 151,
        DataTypeId::Float64 => 141,
        DataTypeId::Decimal64 => 131,
        DataTypeId::Decimal128 => 121,
        DataTypeId::Utf8 => 1,
        _ => 100,
    }
}

const fn int8_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Int8
        | DataTypeId::Int16
        | DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Int128
        | DataTypeId::Float32
        | DataTypeId::Float64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn int16_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Int16
        | DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Int128
        | DataTypeId::Float32
        | DataTypeId::Float64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn int32_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Int128
        | DataTypeId::Float32
        | DataTypeId::Float64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn int64_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    // Note we don't allow implicit casting to Decimal64 (max precision
    // overflow).
    Some(match want {
        DataTypeId::Int64
        | DataTypeId::Int128
        | DataTypeId::Float32
        | DataTypeId::Float64
        | DataTypeId::Decimal128 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn int128_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Float64 | DataTypeId::Decimal128 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn float32_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Float64 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn float64_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn decimal64_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Decimal128 | DataTypeId::Float32 | DataTypeId::Float64 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

const fn decimal128_cast_score(want: DataTypeId, conf: ImplicitCastConfig) -> Option<u32> {
    Some(match want {
        DataTypeId::Float32 | DataTypeId::Float64 => target_score(want),
        DataTypeId::Utf8 if conf.allow_to_utf8 => target_score(want),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_cast_from_utf8() {
        let conf = ImplicitCastConfig::FUNCTION;
        assert!(implicit_cast_score(DataTypeId::Utf8, DataTypeId::Int32, conf).is_some());
        assert!(implicit_cast_score(DataTypeId::Utf8, DataTypeId::Timestamp, conf).is_some());
        assert!(implicit_cast_score(DataTypeId::Utf8, DataTypeId::Interval, conf).is_some());
    }

    #[test]
    fn no_implicit_from_utf8_for_unions() {
        assert!(
            implicit_cast_score(DataTypeId::Utf8, DataTypeId::Int32, ImplicitCastConfig::UNION)
                .is_none()
        );
    }

    #[test]
    fn never_implicit_to_utf8() {
        let conf = ImplicitCastConfig::FUNCTION;
        assert!(implicit_cast_score(DataTypeId::Int16, DataTypeId::Utf8, conf).is_none());
        assert!(implicit_cast_score(DataTypeId::Timestamp, DataTypeId::Utf8, conf).is_none());
    }

    #[test]
    fn integer_casts() {
        let conf = ImplicitCastConfig::FUNCTION;
        // Valid
        assert!(implicit_cast_score(DataTypeId::Int16, DataTypeId::Int64, conf).is_some());
        assert!(implicit_cast_score(DataTypeId::Int16, DataTypeId::Decimal64, conf).is_some());
        assert!(implicit_cast_score(DataTypeId::Int16, DataTypeId::Float32, conf).is_some());

        // Not valid
        assert!(implicit_cast_score(DataTypeId::Int64, DataTypeId::Int16, conf).is_none());
        assert!(implicit_cast_score(DataTypeId::Int64, DataTypeId::Decimal64, conf).is_none());
    }

    #[test]
    fn narrower_scores_higher() {
        let conf = ImplicitCastConfig::FUNCTION;
        let to_i32 = implicit_cast_score(DataTypeId::Int16, DataTypeId::Int32, conf).unwrap();
        let to_i64 = implicit_cast_score(DataTypeId::Int16, DataTypeId::Int64, conf).unwrap();
        assert!(to_i32 > to_i64);
    }

    #[test]
    fn float_casts() {
        let conf = ImplicitCastConfig::FUNCTION;
        assert!(implicit_cast_score(DataTypeId::Float32, DataTypeId::Float64, conf).is_some());
        assert!(implicit_cast_score(DataTypeId::Float64, DataTypeId::Int64, conf).is_none());
    }
}
