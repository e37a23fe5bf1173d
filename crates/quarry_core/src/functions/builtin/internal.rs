//! Functions the binder emits on its own: window boundary markers, index key
//! hashing, sequences and session values.
use crate::functions::{FunctionDef, FunctionKind, FunctionSet};

/// `diff(expr)` is true whenever `expr` changes from the previous row.
/// `diff(prev, expr)` chains onto an earlier diff.
pub const FUNCTION_SET_DIFF: FunctionSet = FunctionSet {
    name: "diff",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[
        FunctionDef::fixed(sig!([Any] => Boolean)),
        FunctionDef::fixed(sig!([Boolean, Any] => Boolean)),
    ],
};

/// `window_bound(diff, frame_unit, bound_kind, offset)`
///
/// Computes the row position of one end of a window frame.
pub const FUNCTION_SET_WINDOW_BOUND: FunctionSet = FunctionSet {
    name: "window_bound",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Boolean, Int32, Int32, Any] => Int64))],
};

pub const FUNCTION_SET_HASH: FunctionSet = FunctionSet {
    name: "hash",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Any] => Int64))],
};

/// `rotate_xor_hash(prev_hash, bits, value)`
///
/// Combines the hash of a multi column key, one column at a time.
pub const FUNCTION_SET_ROTATE_XOR_HASH: FunctionSet = FunctionSet {
    name: "rotate_xor_hash",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Int64, Int32, Any] => Int64))],
};

/// `next_value_for(schema, sequence)`
pub const FUNCTION_SET_NEXT_VALUE_FOR: FunctionSet = FunctionSet {
    name: "next_value_for",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([Utf8, Utf8] => Int64))],
};

pub const FUNCTION_SET_CURRENT_USER: FunctionSet = FunctionSet {
    name: "current_user",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Utf8))],
};

pub const FUNCTION_SET_CURRENT_ROLE: FunctionSet = FunctionSet {
    name: "current_role",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Utf8))],
};

pub const FUNCTION_SET_CURRENT_SCHEMA: FunctionSet = FunctionSet {
    name: "current_schema",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::fixed(sig!([] => Utf8))],
};
