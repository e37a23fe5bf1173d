use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use quarry_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use super::datatype::{DataType, DecimalTypeMeta, IntervalClass};

/// Month/day/microsecond interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

impl Interval {
    pub const fn new(months: i32, days: i32, micros: i64) -> Self {
        Interval {
            months,
            days,
            micros,
        }
    }
}

/// A single constant value.
///
/// Every value carries enough information to recover its exact type, so
/// literal expressions never need a separate type annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Typed null.
    Null(DataType),
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    /// Unscaled decimal value.
    Decimal64(DecimalTypeMeta, i64),
    Decimal128(DecimalTypeMeta, i128),
    Utf8(String),
    Binary(Vec<u8>),
    /// Days since epoch.
    Date32(i32),
    /// Microseconds since midnight.
    Time64(i64),
    /// Microseconds since epoch.
    Timestamp { value: i64, with_tz: bool },
    Interval(IntervalClass, Interval),
}

impl ScalarValue {
    pub const fn null() -> Self {
        ScalarValue::Null(DataType::Null)
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null(typ) => typ.clone(),
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Int128(_) => DataType::Int128,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Decimal64(meta, _) => DataType::Decimal64(*meta),
            Self::Decimal128(meta, _) => DataType::Decimal128(*meta),
            // String literals are typed by their length so that comparisons and
            // inserts into bounded columns widen correctly.
            Self::Utf8(s) => DataType::Utf8 {
                max_length: Some(s.chars().count().max(1) as u32),
            },
            Self::Binary(_) => DataType::Binary,
            Self::Date32(_) => DataType::Date32,
            Self::Time64(_) => DataType::Time64,
            Self::Timestamp { with_tz, .. } => DataType::Timestamp { with_tz: *with_tz },
            Self::Interval(class, _) => DataType::Interval(*class),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Try to get this value as an i64.
    pub fn try_as_i64(&self) -> Result<i64> {
        Ok(match self {
            Self::Int8(v) => *v as i64,
            Self::Int16(v) => *v as i64,
            Self::Int32(v) => *v as i64,
            Self::Int64(v) => *v,
            Self::Int128(v) => i64::try_from(*v)
                .map_err(|_| DbError::invalid_input(format!("Value {v} out of range for Int64")))?,
            Self::Decimal64(meta, v) if meta.scale == 0 => *v,
            Self::Decimal128(meta, v) if meta.scale == 0 => i64::try_from(*v)
                .map_err(|_| DbError::invalid_input(format!("Value {v} out of range for Int64")))?,
            other => {
                return Err(DbError::type_mismatch(format!(
                    "Expected an integer value, got {}",
                    other.datatype()
                )));
            }
        })
    }

    pub fn try_as_f64(&self) -> Result<f64> {
        Ok(match self {
            Self::Float32(v) => *v as f64,
            Self::Float64(v) => *v,
            Self::Decimal64(meta, v) => *v as f64 / 10f64.powi(meta.scale as i32),
            Self::Decimal128(meta, v) => *v as f64 / 10f64.powi(meta.scale as i32),
            other => other.try_as_i64()? as f64,
        })
    }

    /// Try to get this value as a string slice.
    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(s) => Ok(s),
            other => Err(DbError::type_mismatch(format!(
                "Expected a string value, got {}",
                other.datatype()
            ))),
        }
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(DbError::type_mismatch(format!(
                "Expected a boolean value, got {}",
                other.datatype()
            ))),
        }
    }

    /// Parse an unsigned numeric literal as written in SQL.
    ///
    /// Integers get the narrowest of Int32/Int64/Int128 (falling back to a
    /// decimal when they don't fit), digits with a decimal point produce an
    /// exact decimal, and exponent notation produces a Float64.
    pub fn parse_number(text: &str) -> Result<Self> {
        let invalid = || DbError::invalid_input(format!("Invalid numeric literal '{text}'"));

        if text.contains(['e', 'E']) {
            let v: f64 = text.parse().map_err(|_| invalid())?;
            return Ok(ScalarValue::Float64(v));
        }

        if let Some((int_part, frac_part)) = text.split_once('.') {
            if !int_part.chars().all(|c| c.is_ascii_digit())
                || !frac_part.chars().all(|c| c.is_ascii_digit())
                || (int_part.is_empty() && frac_part.is_empty())
            {
                return Err(invalid());
            }
            let int_part = int_part.trim_start_matches('0');
            let scale = frac_part.len();
            let precision = (int_part.len() + scale).max(1);
            if precision > super::datatype::DECIMAL_MAX_PRECISION as usize {
                // Too many digits for an exact decimal.
                let v: f64 = text.parse().map_err(|_| invalid())?;
                return Ok(ScalarValue::Float64(v));
            }
            let digits = format!("{int_part}{frac_part}");
            let unscaled: i128 = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| invalid())?
            };
            let meta = DecimalTypeMeta::new(precision as u8, scale as i8);
            return Ok(match DataType::decimal(meta.precision, meta.scale) {
                DataType::Decimal64(meta) => ScalarValue::Decimal64(meta, unscaled as i64),
                _ => ScalarValue::Decimal128(meta, unscaled),
            });
        }

        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        if let Ok(v) = text.parse::<i32>() {
            return Ok(ScalarValue::Int32(v));
        }
        if let Ok(v) = text.parse::<i64>() {
            return Ok(ScalarValue::Int64(v));
        }
        if let Ok(v) = text.parse::<i128>() {
            return Ok(ScalarValue::Int128(v));
        }

        Err(DbError::invalid_input(format!(
            "Numeric literal '{text}' out of range"
        )))
    }

    /// Negate a numeric literal.
    ///
    /// Used to fold `-<literal>` so that `-2147483648` stays an Int32.
    pub fn try_negate(&self) -> Option<Self> {
        Some(match self {
            Self::Int8(v) => Self::Int8(v.checked_neg()?),
            Self::Int16(v) => Self::Int16(v.checked_neg()?),
            Self::Int32(v) => Self::Int32(v.checked_neg()?),
            Self::Int64(v) => Self::Int64(v.checked_neg()?),
            Self::Int128(v) => Self::Int128(v.checked_neg()?),
            Self::Float32(v) => Self::Float32(-v),
            Self::Float64(v) => Self::Float64(-v),
            Self::Decimal64(m, v) => Self::Decimal64(*m, v.checked_neg()?),
            Self::Decimal128(m, v) => Self::Decimal128(*m, v.checked_neg()?),
            _ => return None,
        })
    }

    /// Number of digits needed to represent this value if it's an exact
    /// numeric.
    ///
    /// Literal `1` contributes a single digit to decimal arithmetic rather
    /// than the 10 digits of an Int32 column.
    pub fn literal_digits(&self) -> Option<u8> {
        fn count(v: i128) -> u8 {
            let mut v = v.unsigned_abs();
            let mut digits = 1;
            while v >= 10 {
                v /= 10;
                digits += 1;
            }
            digits
        }
        match self {
            Self::Int8(v) => Some(count(*v as i128)),
            Self::Int16(v) => Some(count(*v as i128)),
            Self::Int32(v) => Some(count(*v as i128)),
            Self::Int64(v) => Some(count(*v as i128)),
            Self::Int128(v) => Some(count(*v)),
            _ => None,
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

pub fn parse_date(s: &str) -> Result<i32> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DbError::invalid_input(format!("Invalid date '{s}'")).with_source(Box::new(e)))?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| DbError::new("Invalid epoch"))?;
    Ok((date - epoch).num_days() as i32)
}

pub fn parse_time(s: &str) -> Result<i64> {
    let time = NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
        .map_err(|e| DbError::invalid_input(format!("Invalid time '{s}'")).with_source(Box::new(e)))?;
    Ok(time.num_seconds_from_midnight() as i64 * 1_000_000 + (time.nanosecond() / 1000) as i64)
}

/// Parse a timestamp literal, returning microseconds since epoch.
///
/// Inputs with an offset are normalized to UTC.
pub fn parse_timestamp(s: &str, with_tz: bool) -> Result<i64> {
    let s = s.trim();
    if with_tz {
        if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Ok(ts.timestamp_micros());
        }
    }
    let ts = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| {
            DbError::invalid_input(format!("Invalid timestamp '{s}'")).with_source(Box::new(e))
        })?;
    Ok(ts.and_utc().timestamp_micros())
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Int128(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal64(meta, v) => write_decimal(f, *v as i128, meta.scale),
            Self::Decimal128(meta, v) => write_decimal(f, *v, meta.scale),
            Self::Utf8(v) => write!(f, "'{v}'"),
            Self::Binary(v) => {
                write!(f, "X'")?;
                for b in v {
                    write!(f, "{b:02X}")?;
                }
                write!(f, "'")
            }
            Self::Date32(v) => match NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|e| e.checked_add_signed(chrono::Duration::days(*v as i64)))
            {
                Some(date) => write!(f, "DATE '{date}'"),
                None => write!(f, "DATE {v}"),
            },
            Self::Time64(v) => write!(f, "TIME {v}"),
            Self::Timestamp { value, .. } => match DateTime::from_timestamp_micros(*value) {
                Some(ts) => write!(f, "TIMESTAMP '{}'", ts.naive_utc()),
                None => write!(f, "TIMESTAMP {value}"),
            },
            Self::Interval(_, v) => write!(
                f,
                "INTERVAL '{} months {} days {} micros'",
                v.months, v.days, v.micros
            ),
        }
    }
}

fn write_decimal(f: &mut fmt::Formatter<'_>, value: i128, scale: i8) -> fmt::Result {
    if scale <= 0 {
        return write!(f, "{value}");
    }
    let scale = scale as u32;
    let pow = 10_i128.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(
        f,
        "{sign}{}.{:0width$}",
        abs / pow as u128,
        abs % pow as u128,
        width = scale as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integers() {
        assert_eq!(ScalarValue::Int32(1), ScalarValue::parse_number("1").unwrap());
        assert_eq!(
            ScalarValue::Int64(4_000_000_000),
            ScalarValue::parse_number("4000000000").unwrap()
        );
    }

    #[test]
    fn parse_decimal() {
        let v = ScalarValue::parse_number("1.5").unwrap();
        assert_eq!(ScalarValue::Decimal64(DecimalTypeMeta::new(2, 1), 15), v);
        assert_eq!("1.5", v.to_string());

        let v = ScalarValue::parse_number("0.05").unwrap();
        assert_eq!(ScalarValue::Decimal64(DecimalTypeMeta::new(2, 2), 5), v);
    }

    #[test]
    fn parse_float() {
        assert_eq!(
            ScalarValue::Float64(1500.0),
            ScalarValue::parse_number("1.5e3").unwrap()
        );
    }

    #[test]
    fn parse_invalid() {
        ScalarValue::parse_number("1.2.3").unwrap_err();
        ScalarValue::parse_number("abc").unwrap_err();
    }

    #[test]
    fn literal_digit_count() {
        assert_eq!(Some(1), ScalarValue::Int32(1).literal_digits());
        assert_eq!(Some(3), ScalarValue::Int32(-123).literal_digits());
        assert_eq!(None, ScalarValue::Float64(1.0).literal_digits());
    }

    #[test]
    fn dates() {
        assert_eq!(0, parse_date("1970-01-01").unwrap());
        assert_eq!(1, parse_date("1970-01-02").unwrap());
        parse_date("1970-13-02").unwrap_err();
        assert_eq!(86_400_000_000, parse_timestamp("1970-01-02 00:00:00", false).unwrap());
    }
}
