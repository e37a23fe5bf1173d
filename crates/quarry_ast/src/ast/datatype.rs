use serde::{Deserialize, Serialize};

use super::ObjectReference;

/// Data types as written in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `VARCHAR(n)`, `CHARACTER VARYING(n)`
    Varchar(Option<u32>),
    /// `CHAR(n)`
    Char(Option<u32>),
    /// `CLOB`, `TEXT`, `STRING`
    Text,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    HugeInt,
    /// `REAL`, `FLOAT4`
    Real,
    /// `DOUBLE`, `FLOAT`, `FLOAT8`
    Double,
    /// `DECIMAL(p, s)`, `NUMERIC(p, s)`
    Decimal(Option<u8>, Option<i8>),
    Bool,
    Date,
    Time,
    Timestamp {
        with_time_zone: bool,
    },
    Interval(IntervalQualifier),
    Blob,
    /// A user defined type.
    Named(ObjectReference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl IntervalUnit {
    /// Year-month intervals and day-time intervals are distinct classes.
    pub const fn is_year_month(&self) -> bool {
        matches!(self, Self::Year | Self::Month)
    }
}

/// `INTERVAL <leading> [TO <trailing>]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalQualifier {
    pub leading: IntervalUnit,
    pub trailing: Option<IntervalUnit>,
}
