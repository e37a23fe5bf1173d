use crate::functions::{FunctionDef, FunctionKind, FunctionSet, ReturnRule};

pub const FUNCTION_SET_COUNT: FunctionSet = FunctionSet {
    name: "count",
    aliases: &[],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Any] => Int64))],
};

/// `COUNT(*)`
pub const FUNCTION_SET_COUNT_STAR: FunctionSet = FunctionSet {
    name: "count_star",
    aliases: &[],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Int64))],
};

pub const FUNCTION_SET_SUM: FunctionSet = FunctionSet {
    name: "sum",
    aliases: &[],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[
        FunctionDef::new(sig!([Int8] => Int64), ReturnRule::Sum),
        FunctionDef::new(sig!([Int16] => Int64), ReturnRule::Sum),
        FunctionDef::new(sig!([Int32] => Int64), ReturnRule::Sum),
        FunctionDef::new(sig!([Int64] => Int64), ReturnRule::Sum),
        FunctionDef::new(sig!([Int128] => Int128), ReturnRule::Sum),
        FunctionDef::new(sig!([Float32] => Float32), ReturnRule::Sum),
        FunctionDef::new(sig!([Float64] => Float64), ReturnRule::Sum),
        FunctionDef::new(sig!([Decimal64] => Decimal128), ReturnRule::Sum),
        FunctionDef::new(sig!([Decimal128] => Decimal128), ReturnRule::Sum),
        FunctionDef::new(sig!([Interval] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_AVG: FunctionSet = FunctionSet {
    name: "avg",
    aliases: &["mean"],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[
        FunctionDef::new(sig!([Int64] => Float64), ReturnRule::Avg),
        FunctionDef::new(sig!([Float64] => Float64), ReturnRule::Avg),
        FunctionDef::new(sig!([Decimal64] => Decimal128), ReturnRule::Avg),
        FunctionDef::new(sig!([Decimal128] => Decimal128), ReturnRule::Avg),
    ],
};

pub const FUNCTION_SET_MIN: FunctionSet = FunctionSet {
    name: "min",
    aliases: &[],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0))],
};

pub const FUNCTION_SET_MAX: FunctionSet = FunctionSet {
    name: "max",
    aliases: &[],
    kind: FunctionKind::Aggregate,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0))],
};
