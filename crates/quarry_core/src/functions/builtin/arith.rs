use crate::functions::{DecimalOp, FunctionDef, FunctionKind, FunctionSet, ReturnRule};

pub const FUNCTION_SET_ADD: FunctionSet = FunctionSet {
    name: "+",
    aliases: &["add"],
    kind: FunctionKind::Scalar,
    commutative: true,
    functions: &[
        FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32, Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64, Float64] => Float64)),
        // Operands are rescaled to matching decimals before lookup.
        FunctionDef::new(sig!([Decimal64, Decimal64] => Decimal64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Decimal128, Decimal128] => Decimal128), ReturnRule::SameAsArg(0)),
        // Date + days => date
        FunctionDef::fixed(sig!([Date32, Int32] => Date32)),
        FunctionDef::fixed(sig!([Date32, Interval] => Timestamp)),
        FunctionDef::new(sig!([Timestamp, Interval] => Timestamp), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Time64, Interval] => Time64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Interval, Interval] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_SUB: FunctionSet = FunctionSet {
    name: "-",
    aliases: &["sub"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32, Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64, Float64] => Float64)),
        FunctionDef::new(sig!([Decimal64, Decimal64] => Decimal64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Decimal128, Decimal128] => Decimal128), ReturnRule::SameAsArg(0)),
        FunctionDef::fixed(sig!([Date32, Int32] => Date32)),
        // Date - date => days
        FunctionDef::fixed(sig!([Date32, Date32] => Int32)),
        FunctionDef::new(sig!([Timestamp, Interval] => Timestamp), ReturnRule::SameAsArg(0)),
        FunctionDef::fixed(sig!([Timestamp, Timestamp] => Interval)),
        FunctionDef::new(sig!([Time64, Interval] => Time64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Interval, Interval] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_MUL: FunctionSet = FunctionSet {
    name: "*",
    aliases: &["mul"],
    kind: FunctionKind::Scalar,
    commutative: true,
    functions: &[
        FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32, Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64, Float64] => Float64)),
        FunctionDef::new(
            sig!([Decimal64, Decimal64] => Decimal64),
            ReturnRule::DecimalArith(DecimalOp::Mul),
        ),
        FunctionDef::new(
            sig!([Decimal128, Decimal128] => Decimal128),
            ReturnRule::DecimalArith(DecimalOp::Mul),
        ),
        FunctionDef::new(sig!([Interval, Int64] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_DIV: FunctionSet = FunctionSet {
    name: "/",
    aliases: &["div"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32, Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64, Float64] => Float64)),
        FunctionDef::new(
            sig!([Decimal64, Decimal64] => Decimal64),
            ReturnRule::DecimalArith(DecimalOp::Div),
        ),
        FunctionDef::new(
            sig!([Decimal128, Decimal128] => Decimal128),
            ReturnRule::DecimalArith(DecimalOp::Div),
        ),
        FunctionDef::new(sig!([Interval, Int64] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_REM: FunctionSet = FunctionSet {
    name: "%",
    aliases: &["rem", "mod"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32, Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64, Float64] => Float64)),
        FunctionDef::new(sig!([Decimal64, Decimal64] => Decimal64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Decimal128, Decimal128] => Decimal128), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_NEGATE: FunctionSet = FunctionSet {
    name: "negate",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64] => Float64)),
        FunctionDef::new(sig!([Decimal64] => Decimal64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Decimal128] => Decimal128), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Interval] => Interval), ReturnRule::SameAsArg(0)),
    ],
};

pub const FUNCTION_SET_ABS: FunctionSet = FunctionSet {
    name: "abs",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Int8] => Int8)),
        FunctionDef::fixed(sig!([Int16] => Int16)),
        FunctionDef::fixed(sig!([Int32] => Int32)),
        FunctionDef::fixed(sig!([Int64] => Int64)),
        FunctionDef::fixed(sig!([Int128] => Int128)),
        FunctionDef::fixed(sig!([Float32] => Float32)),
        FunctionDef::fixed(sig!([Float64] => Float64)),
        FunctionDef::new(sig!([Decimal64] => Decimal64), ReturnRule::SameAsArg(0)),
        FunctionDef::new(sig!([Decimal128] => Decimal128), ReturnRule::SameAsArg(0)),
    ],
};

/// Bitwise operators are only defined over integers.
const BITWISE_DEFS: &[FunctionDef] = &[
    FunctionDef::fixed(sig!([Int8, Int8] => Int8)),
    FunctionDef::fixed(sig!([Int16, Int16] => Int16)),
    FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
    FunctionDef::fixed(sig!([Int64, Int64] => Int64)),
    FunctionDef::fixed(sig!([Int128, Int128] => Int128)),
];

pub const FUNCTION_SET_BIT_AND: FunctionSet = FunctionSet {
    name: "&",
    aliases: &["bit_and"],
    kind: FunctionKind::Scalar,
    commutative: true,
    functions: BITWISE_DEFS,
};

pub const FUNCTION_SET_BIT_OR: FunctionSet = FunctionSet {
    name: "|",
    aliases: &["bit_or"],
    kind: FunctionKind::Scalar,
    commutative: true,
    functions: BITWISE_DEFS,
};

pub const FUNCTION_SET_XOR: FunctionSet = FunctionSet {
    name: "^",
    aliases: &["xor"],
    kind: FunctionKind::Scalar,
    commutative: true,
    functions: BITWISE_DEFS,
};

/// Shift amount is always an Int32.
const SHIFT_DEFS: &[FunctionDef] = &[
    FunctionDef::fixed(sig!([Int8, Int32] => Int8)),
    FunctionDef::fixed(sig!([Int16, Int32] => Int16)),
    FunctionDef::fixed(sig!([Int32, Int32] => Int32)),
    FunctionDef::fixed(sig!([Int64, Int32] => Int64)),
    FunctionDef::fixed(sig!([Int128, Int32] => Int128)),
];

pub const FUNCTION_SET_SHL: FunctionSet = FunctionSet {
    name: "<<",
    aliases: &["shift_left"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: SHIFT_DEFS,
};

pub const FUNCTION_SET_SHR: FunctionSet = FunctionSet {
    name: ">>",
    aliases: &["shift_right"],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: SHIFT_DEFS,
};
