use crate::functions::{FunctionDef, FunctionKind, FunctionSet};
use crate::types::datatype::DataTypeId;

pub const FUNCTION_SET_GENERATE_SERIES: FunctionSet = FunctionSet {
    name: "generate_series",
    aliases: &[],
    kind: FunctionKind::TableFunction,
    commutative: false,
    functions: &[
        FunctionDef::table(
            sig!([Int64, Int64] => Null),
            &[("generate_series", DataTypeId::Int64)],
        ),
        FunctionDef::table(
            sig!([Int64, Int64, Int64] => Null),
            &[("generate_series", DataTypeId::Int64)],
        ),
    ],
};

/// Delimited text loader for COPY FROM.
///
/// Output columns come from the target table.
pub const FUNCTION_SET_CSV: FunctionSet = FunctionSet {
    name: "csv",
    aliases: &["read_csv"],
    kind: FunctionKind::Loader,
    commutative: false,
    functions: &[FunctionDef::table(sig!([Utf8], ...Utf8 => Null), &[])],
};

/// `CALL sys.vacuum('schema', 'table')`
pub const FUNCTION_SET_VACUUM: FunctionSet = FunctionSet {
    name: "vacuum",
    aliases: &[],
    kind: FunctionKind::Procedure,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Utf8] => Null)),
        FunctionDef::fixed(sig!([Utf8, Utf8] => Null)),
    ],
};
