use crate::functions::{FunctionDef, FunctionKind, FunctionSet, ReturnRule};

pub const FUNCTION_SET_CONCAT: FunctionSet = FunctionSet {
    name: "||",
    aliases: &["concat"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Utf8], ...Utf8 => Utf8)),
        FunctionDef::fixed(sig!([Binary], ...Binary => Binary)),
    ],
};

pub const FUNCTION_SET_LIKE: FunctionSet = FunctionSet {
    name: "like",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Utf8, Utf8] => Boolean)),
        // With ESCAPE
        FunctionDef::fixed(sig!([Utf8, Utf8, Utf8] => Boolean)),
    ],
};

pub const FUNCTION_SET_ILIKE: FunctionSet = FunctionSet {
    name: "ilike",
    aliases: &[],
    kind: FunctionKind::Filter,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Utf8, Utf8] => Boolean)),
        FunctionDef::fixed(sig!([Utf8, Utf8, Utf8] => Boolean)),
    ],
};

pub const FUNCTION_SET_LOWER: FunctionSet = FunctionSet {
    name: "lower",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Utf8] => Utf8), ReturnRule::SameAsArg(0))],
};

pub const FUNCTION_SET_UPPER: FunctionSet = FunctionSet {
    name: "upper",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Utf8] => Utf8), ReturnRule::SameAsArg(0))],
};

pub const FUNCTION_SET_LENGTH: FunctionSet = FunctionSet {
    name: "length",
    aliases: &["char_length", "character_length"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Utf8] => Int64)),
        FunctionDef::fixed(sig!([Binary] => Int64)),
    ],
};

pub const FUNCTION_SET_SUBSTRING: FunctionSet = FunctionSet {
    name: "substring",
    aliases: &["substr"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::new(sig!([Utf8, Int64] => Utf8), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Utf8, Int64, Int64] => Utf8), ReturnRule::SameAsArg(0)),
    ],
};
