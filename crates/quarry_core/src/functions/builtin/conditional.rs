//! Conditional functions.
//!
//! These are built directly by the expression binder once all branches have
//! been coerced to a common type, so every overload accepts `Any`.
use crate::functions::{FunctionDef, FunctionKind, FunctionSet, ReturnRule};

/// `casewhen(cond_1, result_1, ..., cond_n, result_n, else)`
pub const FUNCTION_SET_CASEWHEN: FunctionSet = FunctionSet {
    name: "casewhen",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(
        sig!([Boolean, Any], ...Any => Any),
        ReturnRule::SameAsArg(1),
    )],
};

/// `ifthenelse(cond, then, else)`
pub const FUNCTION_SET_IFTHENELSE: FunctionSet = FunctionSet {
    name: "ifthenelse",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(
        sig!([Boolean, Any, Any] => Any),
        ReturnRule::SameAsArg(1),
    )],
};

pub const FUNCTION_SET_COALESCE: FunctionSet = FunctionSet {
    name: "coalesce",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any], ...Any => Any), ReturnRule::Supertype)],
};

pub const FUNCTION_SET_NULLIF: FunctionSet = FunctionSet {
    name: "nullif",
    aliases: &[],
    kind: FunctionKind::Scalar,
    commutative: false,
    functions: &[FunctionDef::new(sig!([Any, Any] => Any), ReturnRule::SameAsArg(0))],
};
