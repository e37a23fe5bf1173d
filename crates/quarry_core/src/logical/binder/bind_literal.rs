//! Conversion of SQL literals into typed constants.
use quarry_ast::ast::{self, IntervalUnit};
use quarry_error::{DbError, Result};

use crate::expr::cast_expr::CastExpr;
use crate::expr::{self, Expression};
use crate::types::datatype::{DataType, IntervalClass};
use crate::types::scalar::{Interval, ScalarValue, parse_date, parse_time, parse_timestamp};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// Bind a literal.
///
/// `resolve_named` resolves user defined types in typed literals.
pub fn bind_literal(
    literal: &ast::Literal,
    resolve_named: impl FnOnce(&ast::ObjectReference) -> Result<DataType>,
) -> Result<Expression> {
    Ok(match literal {
        ast::Literal::Number(n) => expr::lit(ScalarValue::parse_number(n)?),
        ast::Literal::SingleQuotedString(s) => expr::lit(s.as_str()),
        ast::Literal::HexString(h) => expr::lit(ScalarValue::Binary(decode_hex(h)?)),
        ast::Literal::Boolean(b) => expr::lit(*b),
        ast::Literal::Null => expr::lit(ScalarValue::null()),
        ast::Literal::Typed { datatype, value } => bind_typed(datatype, value, resolve_named)?,
        ast::Literal::Interval { value, qualifier } => {
            expr::lit(parse_interval(value, qualifier)?)
        }
    })
}

fn bind_typed(
    datatype: &ast::DataType,
    value: &str,
    resolve_named: impl FnOnce(&ast::ObjectReference) -> Result<DataType>,
) -> Result<Expression> {
    Ok(match datatype {
        ast::DataType::Date => expr::lit(ScalarValue::Date32(parse_date(value)?)),
        ast::DataType::Time => expr::lit(ScalarValue::Time64(parse_time(value)?)),
        ast::DataType::Timestamp { with_time_zone } => expr::lit(ScalarValue::Timestamp {
            value: parse_timestamp(value, *with_time_zone)?,
            with_tz: *with_time_zone,
        }),
        ast::DataType::Interval(qualifier) => expr::lit(parse_interval(value, qualifier)?),
        other => {
            // Everything else is a string cast to the type.
            let target = DataType::from_ast(other, resolve_named)?;
            Expression::Cast(CastExpr::new(expr::lit(value), target)?)
        }
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(DbError::invalid_input(format!(
            "Blob literal must have an even number of hex digits, got '{s}'"
        )));
    }

    (0..s.len())
        .step_by(2)
        .map(|idx| {
            s.get(idx..idx + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| DbError::invalid_input(format!("Invalid blob literal '{s}'")))
        })
        .collect()
}

/// Parse an interval string for a qualifier.
///
/// Single field intervals accept a (possibly negative) number, seconds may
/// have a fraction. `YEAR TO MONTH` accepts `Y-M`, day-time ranges accept
/// `D H:M:S` trimmed to the qualified fields.
pub fn parse_interval(value: &str, qualifier: &ast::IntervalQualifier) -> Result<ScalarValue> {
    let invalid = || {
        DbError::invalid_input(format!("Invalid interval literal '{value}'"))
            .with_field("value", value)
    };

    let trimmed = value.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let class = if qualifier.leading.is_year_month() {
        IntervalClass::YearMonth
    } else {
        IntervalClass::DayTime
    };

    let leading = qualifier.leading;
    let mut interval = match qualifier.trailing {
        None => single_field(leading, body).map_err(|_| invalid())?,
        Some(trailing) if trailing == leading => single_field(leading, body).map_err(|_| invalid())?,
        Some(IntervalUnit::Month) if leading == IntervalUnit::Year => {
            let (years, months) = body.split_once('-').ok_or_else(invalid)?;
            let years: i32 = years.trim().parse().map_err(|_| invalid())?;
            let months: i32 = months.trim().parse().map_err(|_| invalid())?;
            if !(0..12).contains(&months) {
                return Err(invalid());
            }
            Interval::new(years * 12 + months, 0, 0)
        }
        Some(trailing) if !leading.is_year_month() && !trailing.is_year_month() => {
            day_time_range(leading, body).map_err(|_| invalid())?
        }
        Some(_) => {
            return Err(DbError::invalid_input(
                "Interval qualifier cannot mix year-month and day-time fields",
            ));
        }
    };

    if negative {
        interval = Interval::new(-interval.months, -interval.days, -interval.micros);
    }

    Ok(ScalarValue::Interval(class, interval))
}

fn single_field(unit: IntervalUnit, body: &str) -> Result<Interval> {
    if unit == IntervalUnit::Second {
        let secs: f64 = body
            .parse()
            .map_err(|_| DbError::invalid_input("Invalid seconds"))?;
        return Ok(Interval::new(0, 0, (secs * MICROS_PER_SECOND as f64).round() as i64));
    }

    let n: i64 = body
        .parse()
        .map_err(|_| DbError::invalid_input("Invalid interval field"))?;
    let narrow = |v: i64| {
        i32::try_from(v).map_err(|_| DbError::invalid_input("Interval field out of range"))
    };

    Ok(match unit {
        IntervalUnit::Year => Interval::new(narrow(n.saturating_mul(12))?, 0, 0),
        IntervalUnit::Month => Interval::new(narrow(n)?, 0, 0),
        IntervalUnit::Day => Interval::new(0, narrow(n)?, 0),
        IntervalUnit::Hour => Interval::new(0, 0, n.saturating_mul(MICROS_PER_HOUR)),
        IntervalUnit::Minute => Interval::new(0, 0, n.saturating_mul(MICROS_PER_MINUTE)),
        IntervalUnit::Second => Interval::new(0, 0, n.saturating_mul(MICROS_PER_SECOND)),
    })
}

/// `D H:M:S`, `H:M:S`, `M:S` depending on the leading field.
fn day_time_range(leading: IntervalUnit, body: &str) -> Result<Interval> {
    let bad = || DbError::invalid_input("Invalid day-time interval");

    let (days, clock) = match leading {
        IntervalUnit::Day => match body.split_once(' ') {
            Some((days, clock)) => (days.trim().parse::<i32>().map_err(|_| bad())?, clock.trim()),
            None => (body.parse::<i32>().map_err(|_| bad())?, ""),
        },
        _ => (0, body),
    };

    let mut parts = clock.split(':').filter(|p| !p.is_empty());
    let scales: &[i64] = match leading {
        IntervalUnit::Day | IntervalUnit::Hour => &[MICROS_PER_HOUR, MICROS_PER_MINUTE],
        _ => &[MICROS_PER_MINUTE],
    };

    let mut micros = 0;
    for scale in scales {
        match parts.next() {
            Some(part) => micros += part.parse::<i64>().map_err(|_| bad())? * scale,
            None => return Ok(Interval::new(0, days, micros)),
        }
    }
    if let Some(secs) = parts.next() {
        let secs: f64 = secs.parse().map_err(|_| bad())?;
        micros += (secs * MICROS_PER_SECOND as f64).round() as i64;
    }
    if parts.next().is_some() {
        return Err(bad());
    }

    Ok(Interval::new(0, days, micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_named(_: &ast::ObjectReference) -> Result<DataType> {
        Err(DbError::new("no named types"))
    }

    fn qualifier(leading: IntervalUnit, trailing: Option<IntervalUnit>) -> ast::IntervalQualifier {
        ast::IntervalQualifier { leading, trailing }
    }

    #[test]
    fn number_literals() {
        let e = bind_literal(&ast::Literal::Number("1".to_string()), no_named).unwrap();
        assert_eq!(DataType::Int32, e.datatype());

        let e = bind_literal(&ast::Literal::Number("1.5".to_string()), no_named).unwrap();
        assert_eq!(DataType::decimal(2, 1), e.datatype());

        let e = bind_literal(&ast::Literal::Number("1e3".to_string()), no_named).unwrap();
        assert_eq!(DataType::Float64, e.datatype());
    }

    #[test]
    fn hex_blob() {
        let e = bind_literal(&ast::Literal::HexString("0fAB".to_string()), no_named).unwrap();
        assert_eq!(expr::lit(ScalarValue::Binary(vec![0x0f, 0xab])), e);

        bind_literal(&ast::Literal::HexString("abc".to_string()), no_named).unwrap_err();
        bind_literal(&ast::Literal::HexString("zz".to_string()), no_named).unwrap_err();
    }

    #[test]
    fn typed_date() {
        let e = bind_literal(
            &ast::Literal::Typed {
                datatype: ast::DataType::Date,
                value: "1970-01-02".to_string(),
            },
            no_named,
        )
        .unwrap();
        assert_eq!(expr::lit(ScalarValue::Date32(1)), e);
    }

    #[test]
    fn typed_other_is_cast() {
        let e = bind_literal(
            &ast::Literal::Typed {
                datatype: ast::DataType::BigInt,
                value: "42".to_string(),
            },
            no_named,
        )
        .unwrap();
        assert!(matches!(e, Expression::Cast(_)));
        assert_eq!(DataType::Int64, e.datatype());
    }

    #[test]
    fn interval_single_fields() {
        let v = parse_interval("3", &qualifier(IntervalUnit::Day, None)).unwrap();
        assert_eq!(
            ScalarValue::Interval(IntervalClass::DayTime, Interval::new(0, 3, 0)),
            v
        );

        let v = parse_interval("-2", &qualifier(IntervalUnit::Year, None)).unwrap();
        assert_eq!(
            ScalarValue::Interval(IntervalClass::YearMonth, Interval::new(-24, 0, 0)),
            v
        );

        let v = parse_interval("1.5", &qualifier(IntervalUnit::Second, None)).unwrap();
        assert_eq!(
            ScalarValue::Interval(IntervalClass::DayTime, Interval::new(0, 0, 1_500_000)),
            v
        );
    }

    #[test]
    fn interval_ranges() {
        let v = parse_interval(
            "1-6",
            &qualifier(IntervalUnit::Year, Some(IntervalUnit::Month)),
        )
        .unwrap();
        assert_eq!(
            ScalarValue::Interval(IntervalClass::YearMonth, Interval::new(18, 0, 0)),
            v
        );

        let v = parse_interval(
            "2 03:04:05",
            &qualifier(IntervalUnit::Day, Some(IntervalUnit::Second)),
        )
        .unwrap();
        assert_eq!(
            ScalarValue::Interval(
                IntervalClass::DayTime,
                Interval::new(0, 2, 3 * MICROS_PER_HOUR + 4 * MICROS_PER_MINUTE + 5 * MICROS_PER_SECOND)
            ),
            v
        );

        parse_interval(
            "1-13",
            &qualifier(IntervalUnit::Year, Some(IntervalUnit::Month)),
        )
        .unwrap_err();
        parse_interval(
            "1",
            &qualifier(IntervalUnit::Year, Some(IntervalUnit::Day)),
        )
        .unwrap_err();
    }
}
