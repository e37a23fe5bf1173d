//! Scalar types and the rules for combining them.
pub mod cast;
pub mod datatype;
pub mod scalar;
pub mod supertype;

pub use datatype::{DataType, DataTypeId, DecimalTypeMeta, IntervalClass, TypeClass};
pub use scalar::ScalarValue;
pub use supertype::supertype;
