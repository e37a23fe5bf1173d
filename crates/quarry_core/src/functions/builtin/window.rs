use crate::functions::{FunctionDef, FunctionKind, FunctionSet, ReturnRule};

pub const FUNCTION_SET_ROW_NUMBER: FunctionSet = FunctionSet {
    name: "row_number",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Int64))],
};

pub const FUNCTION_SET_RANK: FunctionSet = FunctionSet {
    name: "rank",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Int64))],
};

pub const FUNCTION_SET_DENSE_RANK: FunctionSet = FunctionSet {
    name: "dense_rank",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Int64))],
};

pub const FUNCTION_SET_PERCENT_RANK: FunctionSet = FunctionSet {
    name: "percent_rank",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Float64))],
};

pub const FUNCTION_SET_CUME_DIST: FunctionSet = FunctionSet {
    name: "cume_dist",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Float64))],
};

pub const FUNCTION_SET_NTILE: FunctionSet = FunctionSet {
    name: "ntile",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Int64] => Int64))],
};

pub const FUNCTION_SET_LAG: FunctionSet = FunctionSet {
    name: "lag",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[
        FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Any, Int64] => Any), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Any, Int64, Any] => Any), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_LEAD: FunctionSet = FunctionSet {
    name: "lead",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[
        FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Any, Int64] => Any), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Any, Int64, Any] => Any), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_FIRST_VALUE: FunctionSet = FunctionSet {
    name: "first_value",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0))],
};

pub const FUNCTION_SET_LAST_VALUE: FunctionSet = FunctionSet {
    name: "last_value",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any] => Any), ReturnRule::SameAsArg(0))],
};

pub const FUNCTION_SET_NTH_VALUE: FunctionSet = FunctionSet {
    name: "nth_value",
    aliases: &[],
    kind: FunctionKind::Window,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any, Int64] => Any), ReturnRule::SameAsArg(0))],
};
