use std::fmt;

use quarry_ast::ast;
use quarry_error::{DbError, Result};
use serde::{Deserialize, Serialize};

/// Max precision of any decimal.
pub const DECIMAL_MAX_PRECISION: u8 = 38;
/// Max precision that fits in a 64-bit decimal.
pub const DECIMAL64_MAX_PRECISION: u8 = 18;
/// Scale used when a decimal is declared without one.
pub const DECIMAL_DEFAULT_SCALE: i8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataTypeId {
    /// Any datatype.
    ///
    /// Only used in function signatures. A concrete expression is never typed
    /// as `Any`, parameters of this type take on the type of the argument.
    Any,
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Decimal64,
    Decimal128,
    Utf8,
    Binary,
    Date32,
    Time64,
    Timestamp,
    Interval,
    /// Internal row identifier.
    RowId,
    Struct,
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Any => "Any",
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Int128 => "Int128",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::Decimal64 => "Decimal64",
            Self::Decimal128 => "Decimal128",
            Self::Utf8 => "Utf8",
            Self::Binary => "Binary",
            Self::Date32 => "Date32",
            Self::Time64 => "Time64",
            Self::Timestamp => "Timestamp",
            Self::Interval => "Interval",
            Self::RowId => "RowId",
            Self::Struct => "Struct",
        };
        write!(f, "{s}")
    }
}

/// Equivalence classes of types.
///
/// Implicit conversions within a class never lose information in the widening
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeClass {
    /// Exact integers.
    Numeric,
    Decimal,
    /// Floating point.
    Approximate,
    String,
    Boolean,
    Temporal,
    Interval,
    Blob,
    Struct,
    Any,
    Null,
}

impl DataTypeId {
    pub const fn type_class(&self) -> TypeClass {
        match self {
            Self::Any => TypeClass::Any,
            Self::Null => TypeClass::Null,
            Self::Boolean => TypeClass::Boolean,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Int128 | Self::RowId => {
                TypeClass::Numeric
            }
            Self::Float32 | Self::Float64 => TypeClass::Approximate,
            Self::Decimal64 | Self::Decimal128 => TypeClass::Decimal,
            Self::Utf8 => TypeClass::String,
            Self::Binary => TypeClass::Blob,
            Self::Date32 | Self::Time64 | Self::Timestamp => TypeClass::Temporal,
            Self::Interval => TypeClass::Interval,
            Self::Struct => TypeClass::Struct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalTypeMeta {
    pub precision: u8,
    pub scale: i8,
}

impl DecimalTypeMeta {
    pub const fn new(precision: u8, scale: i8) -> Self {
        DecimalTypeMeta { precision, scale }
    }

    /// Digits to the left of the decimal point.
    pub const fn integer_digits(&self) -> i16 {
        self.precision as i16 - self.scale as i16
    }
}

/// Year-month intervals and day-time intervals do not mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalClass {
    YearMonth,
    DayTime,
}

impl fmt::Display for IntervalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YearMonth => write!(f, "YearMonth"),
            Self::DayTime => write!(f, "DayTime"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructTypeMeta {
    pub fields: Vec<(String, DataType)>,
}

/// Resolved scalar types.
///
/// Some types include additional metadata (precision/scale, length) which
/// refines the type further. Two types are only equal if their metadata is
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Constant null.
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Decimal64(DecimalTypeMeta),
    Decimal128(DecimalTypeMeta),
    /// Strings with an optional max length in characters.
    Utf8 { max_length: Option<u32> },
    Binary,
    /// Days since epoch.
    Date32,
    /// Microseconds since midnight.
    Time64,
    /// Microseconds since epoch.
    Timestamp { with_tz: bool },
    Interval(IntervalClass),
    RowId,
    /// Row constructors.
    Struct(StructTypeMeta),
}

impl DataType {
    pub const UTF8: DataType = DataType::Utf8 { max_length: None };
    pub const TIMESTAMP: DataType = DataType::Timestamp { with_tz: false };

    /// Try to create a default data type from the the data type id.
    ///
    /// Errors for ids that can never be a concrete type (any) or that need
    /// more information (struct).
    pub fn try_default_datatype(id: DataTypeId) -> Result<Self> {
        Ok(match id {
            DataTypeId::Any => return Err(DbError::new("Cannot create a default Any datatype")),
            DataTypeId::Struct => {
                return Err(DbError::new("Cannot create a default Struct datatype"));
            }
            DataTypeId::Null => DataType::Null,
            DataTypeId::Boolean => DataType::Boolean,
            DataTypeId::Int8 => DataType::Int8,
            DataTypeId::Int16 => DataType::Int16,
            DataTypeId::Int32 => DataType::Int32,
            DataTypeId::Int64 => DataType::Int64,
            DataTypeId::Int128 => DataType::Int128,
            DataTypeId::Float32 => DataType::Float32,
            DataTypeId::Float64 => DataType::Float64,
            DataTypeId::Decimal64 => DataType::Decimal64(DecimalTypeMeta::new(
                DECIMAL64_MAX_PRECISION,
                DECIMAL_DEFAULT_SCALE,
            )),
            DataTypeId::Decimal128 => DataType::Decimal128(DecimalTypeMeta::new(
                DECIMAL_MAX_PRECISION,
                DECIMAL_DEFAULT_SCALE,
            )),
            DataTypeId::Utf8 => DataType::UTF8,
            DataTypeId::Binary => DataType::Binary,
            DataTypeId::Date32 => DataType::Date32,
            DataTypeId::Time64 => DataType::Time64,
            DataTypeId::Timestamp => DataType::TIMESTAMP,
            DataTypeId::Interval => DataType::Interval(IntervalClass::DayTime),
            DataTypeId::RowId => DataType::RowId,
        })
    }

    /// Create a decimal type, picking the physical width from the precision.
    ///
    /// Precision is clamped to the max supported precision.
    pub fn decimal(precision: u8, scale: i8) -> Self {
        let precision = precision.clamp(1, DECIMAL_MAX_PRECISION);
        let scale = scale.min(precision as i8);
        let meta = DecimalTypeMeta::new(precision, scale);
        if precision <= DECIMAL64_MAX_PRECISION {
            DataType::Decimal64(meta)
        } else {
            DataType::Decimal128(meta)
        }
    }

    pub const fn varchar(len: u32) -> Self {
        DataType::Utf8 {
            max_length: Some(len),
        }
    }

    pub const fn datatype_id(&self) -> DataTypeId {
        match self {
            DataType::Null => DataTypeId::Null,
            DataType::Boolean => DataTypeId::Boolean,
            DataType::Int8 => DataTypeId::Int8,
            DataType::Int16 => DataTypeId::Int16,
            DataType::Int32 => DataTypeId::Int32,
            DataType::Int64 => DataTypeId::Int64,
            DataType::Int128 => DataTypeId::Int128,
            DataType::Float32 => DataTypeId::Float32,
            DataType::Float64 => DataTypeId::Float64,
            DataType::Decimal64(_) => DataTypeId::Decimal64,
            DataType::Decimal128(_) => DataTypeId::Decimal128,
            DataType::Utf8 { .. } => DataTypeId::Utf8,
            DataType::Binary => DataTypeId::Binary,
            DataType::Date32 => DataTypeId::Date32,
            DataType::Time64 => DataTypeId::Time64,
            DataType::Timestamp { .. } => DataTypeId::Timestamp,
            DataType::Interval(_) => DataTypeId::Interval,
            DataType::RowId => DataTypeId::RowId,
            DataType::Struct(_) => DataTypeId::Struct,
        }
    }

    pub const fn type_class(&self) -> TypeClass {
        self.datatype_id().type_class()
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Int128
        )
    }

    pub const fn is_decimal(&self) -> bool {
        matches!(self, DataType::Decimal64(_) | DataType::Decimal128(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Integers and decimals.
    pub const fn is_exact_numeric(&self) -> bool {
        self.is_integer() || self.is_decimal()
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_exact_numeric() || self.is_float()
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date32 | DataType::Time64 | DataType::Timestamp { .. }
        )
    }

    pub const fn decimal_meta(&self) -> Option<DecimalTypeMeta> {
        match self {
            DataType::Decimal64(m) | DataType::Decimal128(m) => Some(*m),
            _ => None,
        }
    }

    /// Number of decimal digits an exact numeric type can hold, along with the
    /// scale.
    ///
    /// Returns None for non-exact types.
    pub const fn exact_digits(&self) -> Option<(u8, i8)> {
        Some(match self {
            DataType::Int8 => (3, 0),
            DataType::Int16 => (5, 0),
            DataType::Int32 => (10, 0),
            DataType::Int64 | DataType::RowId => (19, 0),
            DataType::Int128 => (38, 0),
            DataType::Decimal64(m) | DataType::Decimal128(m) => (m.precision, m.scale),
            _ => return None,
        })
    }

    /// Width in bytes for floating point types.
    pub const fn float_width(&self) -> Option<u8> {
        match self {
            DataType::Float32 => Some(4),
            DataType::Float64 => Some(8),
            _ => None,
        }
    }

    /// Smallest integer type that can hold `digits` decimal digits.
    pub fn integer_for_digits(digits: u8) -> Option<Self> {
        Some(match digits {
            0..=2 => DataType::Int8,
            3..=4 => DataType::Int16,
            5..=9 => DataType::Int32,
            10..=18 => DataType::Int64,
            19..=38 => DataType::Int128,
            _ => return None,
        })
    }

    /// Get a concrete type for `id` to use when casting a value of this type.
    ///
    /// Preserves as much information from `self` as the target allows, e.g.
    /// casting Int32 to a Decimal keeps the 10 digits of precision.
    pub fn cast_target(&self, id: DataTypeId) -> Result<DataType> {
        if self.datatype_id() == id {
            return Ok(self.clone());
        }

        match id {
            DataTypeId::Decimal64 | DataTypeId::Decimal128 => {
                if let Some((precision, scale)) = self.exact_digits() {
                    let meta = DecimalTypeMeta::new(precision, scale);
                    return Ok(match id {
                        DataTypeId::Decimal64 if precision <= DECIMAL64_MAX_PRECISION => {
                            DataType::Decimal64(meta)
                        }
                        DataTypeId::Decimal64 => {
                            DataType::try_default_datatype(DataTypeId::Decimal64)?
                        }
                        _ => DataType::Decimal128(meta),
                    });
                }
                DataType::try_default_datatype(id)
            }
            DataTypeId::Interval => match self {
                DataType::Interval(class) => Ok(DataType::Interval(*class)),
                _ => DataType::try_default_datatype(id),
            },
            DataTypeId::Timestamp => match self {
                DataType::Timestamp { with_tz } => Ok(DataType::Timestamp { with_tz: *with_tz }),
                _ => Ok(DataType::TIMESTAMP),
            },
            other => DataType::try_default_datatype(other),
        }
    }

    /// Convert a SQL data type into a concrete type.
    ///
    /// `resolve_named` is used for user defined types.
    pub fn from_ast(
        datatype: &ast::DataType,
        resolve_named: impl FnOnce(&ast::ObjectReference) -> Result<DataType>,
    ) -> Result<Self> {
        Ok(match datatype {
            ast::DataType::Varchar(len) | ast::DataType::Char(len) => {
                if *len == Some(0) {
                    return Err(DbError::invalid_input(
                        "String length must be greater than zero",
                    ));
                }
                DataType::Utf8 { max_length: *len }
            }
            ast::DataType::Text => DataType::UTF8,
            ast::DataType::TinyInt => DataType::Int8,
            ast::DataType::SmallInt => DataType::Int16,
            ast::DataType::Integer => DataType::Int32,
            ast::DataType::BigInt => DataType::Int64,
            ast::DataType::HugeInt => DataType::Int128,
            ast::DataType::Real => DataType::Float32,
            ast::DataType::Double => DataType::Float64,
            ast::DataType::Decimal(precision, scale) => {
                let precision = precision.unwrap_or(DECIMAL64_MAX_PRECISION);
                let scale = scale.unwrap_or(if precision == DECIMAL64_MAX_PRECISION {
                    DECIMAL_DEFAULT_SCALE
                } else {
                    0
                });
                if precision == 0 || precision > DECIMAL_MAX_PRECISION {
                    return Err(DbError::invalid_input(format!(
                        "Decimal precision must be between 1 and {DECIMAL_MAX_PRECISION}, got {precision}"
                    )));
                }
                if scale < 0 || scale as u8 > precision {
                    return Err(DbError::invalid_input(format!(
                        "Decimal scale {scale} out of range for precision {precision}"
                    )));
                }
                DataType::decimal(precision, scale)
            }
            ast::DataType::Bool => DataType::Boolean,
            ast::DataType::Date => DataType::Date32,
            ast::DataType::Time => DataType::Time64,
            ast::DataType::Timestamp { with_time_zone } => DataType::Timestamp {
                with_tz: *with_time_zone,
            },
            ast::DataType::Interval(qualifier) => {
                let leading = qualifier.leading.is_year_month();
                let trailing = qualifier.trailing.map(|t| t.is_year_month()).unwrap_or(leading);
                if leading != trailing {
                    return Err(DbError::invalid_input(
                        "Interval qualifier cannot mix year-month and day-time fields",
                    ));
                }
                if leading {
                    DataType::Interval(IntervalClass::YearMonth)
                } else {
                    DataType::Interval(IntervalClass::DayTime)
                }
            }
            ast::DataType::Blob => DataType::Binary,
            ast::DataType::Named(reference) => resolve_named(reference)?,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Int128 => write!(f, "Int128"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::Decimal64(meta) => write!(f, "Decimal64({},{})", meta.precision, meta.scale),
            Self::Decimal128(meta) => write!(f, "Decimal128({},{})", meta.precision, meta.scale),
            Self::Utf8 { max_length: None } => write!(f, "Utf8"),
            Self::Utf8 {
                max_length: Some(len),
            } => write!(f, "Utf8({len})"),
            Self::Binary => write!(f, "Binary"),
            Self::Date32 => write!(f, "Date32"),
            Self::Time64 => write!(f, "Time64"),
            Self::Timestamp { with_tz: false } => write!(f, "Timestamp"),
            Self::Timestamp { with_tz: true } => write!(f, "Timestamp(tz)"),
            Self::Interval(class) => write!(f, "Interval({class})"),
            Self::RowId => write!(f, "RowId"),
            Self::Struct(meta) => write!(
                f,
                "Struct {{{}}}",
                meta.fields
                    .iter()
                    .map(|(name, typ)| format!("{name}: {typ}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_named(_: &ast::ObjectReference) -> Result<DataType> {
        Err(DbError::not_found("no types"))
    }

    #[test]
    fn decimal_width_from_precision() {
        assert_eq!(
            DataType::Decimal64(DecimalTypeMeta::new(18, 2)),
            DataType::decimal(18, 2)
        );
        assert_eq!(
            DataType::Decimal128(DecimalTypeMeta::new(19, 2)),
            DataType::decimal(19, 2)
        );
        // Clamped.
        assert_eq!(
            DataType::Decimal128(DecimalTypeMeta::new(38, 2)),
            DataType::decimal(50, 2)
        );
    }

    #[test]
    fn from_ast_varchar() {
        let typ = DataType::from_ast(&ast::DataType::Varchar(Some(10)), no_named).unwrap();
        assert_eq!(DataType::varchar(10), typ);
    }

    #[test]
    fn from_ast_bad_decimal() {
        let err = DataType::from_ast(&ast::DataType::Decimal(Some(4), Some(6)), no_named)
            .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn int_cast_target_keeps_digits() {
        let typ = DataType::Int32.cast_target(DataTypeId::Decimal64).unwrap();
        assert_eq!(DataType::Decimal64(DecimalTypeMeta::new(10, 0)), typ);

        let typ = DataType::Int64.cast_target(DataTypeId::Decimal128).unwrap();
        assert_eq!(DataType::Decimal128(DecimalTypeMeta::new(19, 0)), typ);
    }
}
