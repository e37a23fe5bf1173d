use crate::functions::{FunctionDef, FunctionKind, FunctionSet};

pub const FUNCTION_SET_AND: FunctionSet = FunctionSet {
    name: "and",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: true,
    functions: &[FunctionDef::fixed(sig!([], ...Boolean => Boolean))],
};

pub const FUNCTION_SET_OR: FunctionSet = FunctionSet {
    name: "or",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: true,
    functions: &[FunctionDef::fixed(sig!([], ...Boolean => Boolean))],
};

pub const FUNCTION_SET_NOT: FunctionSet = FunctionSet {
    name: "not",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean] => Boolean))],
};

pub const FUNCTION_SET_IS_NULL: FunctionSet = FunctionSet {
    name: "is_null",
    aliases: &["isnull"],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Any] => Boolean))],
};

pub const FUNCTION_SET_IS_NOT_NULL: FunctionSet = FunctionSet {
    name: "is_not_null",
    aliases: &["isnotnull"],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Any] => Boolean))],
};

pub const FUNCTION_SET_IS_TRUE: FunctionSet = FunctionSet {
    name: "is_true",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean] => Boolean))],
};

pub const FUNCTION_SET_IS_NOT_TRUE: FunctionSet = FunctionSet {
    name: "is_not_true",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean] => Boolean))],
};

pub const FUNCTION_SET_IS_FALSE: FunctionSet = FunctionSet {
    name: "is_false",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean] => Boolean))],
};

pub const FUNCTION_SET_IS_NOT_FALSE: FunctionSet = FunctionSet {
    name: "is_not_false",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean] => Boolean))],
};
