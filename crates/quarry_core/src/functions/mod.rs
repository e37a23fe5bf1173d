//! Function signatures, the builtin function registry, and overload
//! resolution.
pub mod builtin;
pub mod candidate;
pub mod decimal;
pub mod implicit;
pub mod resolve;

use std::fmt;

use quarry_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::expr::Expression;
use crate::types::datatype::{DataType, DataTypeId, DecimalTypeMeta};
use crate::types::supertype::supertype_of;

/// Function signature.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Expected positional input argument types for this signature.
    pub positional_args: &'static [DataTypeId],

    /// Type of the variadic args if this function is variadic.
    ///
    /// If None, the function is not considered variadic.
    ///
    /// If the variadic type is `DataTypeId::Any`, and the user provides 1 or
    /// more variadic arguments, the signature will never be considered an exact
    /// match, and instead a candidate signature search will be triggered. All
    /// variadic arguments are then cast to their common supertype.
    pub variadic_arg: Option<DataTypeId>,

    /// The expected return type.
    ///
    /// Informational, the concrete type comes from the function's
    /// `ReturnRule`.
    pub return_type: DataTypeId,
}

impl Signature {
    pub const fn new(inputs: &'static [DataTypeId], return_type: DataTypeId) -> Self {
        Signature {
            positional_args: inputs,
            variadic_arg: None,
            return_type,
        }
    }

    pub const fn new_variadic(
        inputs: &'static [DataTypeId],
        variadic: DataTypeId,
        return_type: DataTypeId,
    ) -> Self {
        Signature {
            positional_args: inputs,
            variadic_arg: Some(variadic),
            return_type,
        }
    }

    /// Check if this signature is a variadic signature.
    pub const fn is_variadic(&self) -> bool {
        self.variadic_arg.is_some()
    }

    /// Check if the number of inputs could satisfy this signature.
    pub fn arity_matches(&self, num_inputs: usize) -> bool {
        if self.is_variadic() {
            num_inputs >= self.positional_args.len()
        } else {
            num_inputs == self.positional_args.len()
        }
    }

    /// Return if inputs given data types exactly satisfy the signature.
    pub fn exact_match(&self, inputs: &[DataType]) -> bool {
        if !self.arity_matches(inputs.len()) {
            return false;
        }

        for (&expected, have) in self.positional_args.iter().zip(inputs.iter()) {
            if expected == DataTypeId::Any {
                continue;
            }

            if have.datatype_id() != expected {
                return false;
            }
        }

        // Check variadic.
        if let Some(expected) = self.variadic_arg {
            let remaining = &inputs[self.positional_args.len()..];
            for have in remaining {
                if expected == DataTypeId::Any {
                    // If we're matching against any, we're never an exact match.
                    return false;
                }

                if have.datatype_id() != expected {
                    return false;
                }
            }
        }

        true
    }

    /// Expected type id for the argument at `idx`.
    pub fn arg_at(&self, idx: usize) -> Option<DataTypeId> {
        self.positional_args.get(idx).copied().or(self.variadic_arg)
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.positional_args == other.positional_args
            && self.variadic_arg == other.variadic_arg
            && self.return_type == other.return_type
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args: Vec<String> = self.positional_args.iter().map(|a| a.to_string()).collect();
        if let Some(variadic) = self.variadic_arg {
            args.push(format!("{variadic}..."));
        }
        write!(f, "({}) -> {}", args.join(", "), self.return_type)
    }
}

/// What a function is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Scalar,
    /// Scalar function producing a boolean, usable as a predicate.
    Filter,
    Aggregate,
    /// Ranking and analytic functions. Only valid with an OVER clause.
    Window,
    Procedure,
    TableFunction,
    /// Table function reading external data for COPY FROM.
    Loader,
}

impl FunctionKind {
    /// If a function set of this kind can be used where `want` is requested.
    pub const fn satisfies(&self, want: FunctionKind) -> bool {
        matches!(
            (self, want),
            (Self::Scalar, Self::Scalar)
                | (Self::Filter, Self::Scalar)
                | (Self::Filter, Self::Filter)
                | (Self::Scalar, Self::Filter)
                | (Self::Aggregate, Self::Aggregate)
                | (Self::Aggregate, Self::Window)
                | (Self::Window, Self::Window)
                | (Self::Procedure, Self::Procedure)
                | (Self::TableFunction, Self::TableFunction)
                | (Self::Loader, Self::Loader)
                | (Self::Loader, Self::TableFunction)
        )
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scalar => "scalar function",
            Self::Filter => "filter function",
            Self::Aggregate => "aggregate function",
            Self::Window => "window function",
            Self::Procedure => "procedure",
            Self::TableFunction => "table function",
            Self::Loader => "loader",
        };
        write!(f, "{s}")
    }
}

/// Decimal operators with their own result precision rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalOp {
    Mul,
    Div,
}

/// How the concrete return type is computed from the (already cast) inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// The default type for an id.
    Fixed(DataTypeId),
    /// Same type as the argument at the index.
    SameAsArg(usize),
    /// Supertype of all arguments.
    Supertype,
    DecimalArith(DecimalOp),
    /// Integers sum into Int64, decimals into a max precision decimal.
    Sum,
    /// Integers average into Float64, decimals keep their scale.
    Avg,
}

impl ReturnRule {
    pub fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        match self {
            Self::Fixed(id) => DataType::try_default_datatype(*id),
            Self::SameAsArg(idx) => inputs.get(*idx).cloned().ok_or_else(|| {
                DbError::new(format!("Missing argument {idx} for computing return type"))
            }),
            Self::Supertype => supertype_of(inputs),
            Self::DecimalArith(op) => {
                let (left, right) = match inputs {
                    [left, right] => (left, right),
                    _ => return Err(DbError::new("Decimal arithmetic expects two inputs")),
                };
                let (l, r) = match (left.decimal_meta(), right.decimal_meta()) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return Err(DbError::new("Decimal arithmetic expects decimal inputs")),
                };
                Ok(decimal::arith_result(*op, l, r))
            }
            Self::Sum => {
                let input = inputs
                    .first()
                    .ok_or_else(|| DbError::new("Sum expects one input"))?;
                Ok(match input {
                    DataType::Int128 => DataType::Int128,
                    typ if typ.is_integer() => DataType::Int64,
                    DataType::Decimal64(m) | DataType::Decimal128(m) => {
                        DataType::Decimal128(DecimalTypeMeta::new(38, m.scale))
                    }
                    other => other.clone(),
                })
            }
            Self::Avg => {
                let input = inputs
                    .first()
                    .ok_or_else(|| DbError::new("Avg expects one input"))?;
                Ok(match input {
                    DataType::Decimal64(m) | DataType::Decimal128(m) => {
                        DataType::Decimal128(DecimalTypeMeta::new(38, m.scale))
                    }
                    _ => DataType::Float64,
                })
            }
        }
    }
}

/// A single overload.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    pub signature: Signature,
    pub return_rule: ReturnRule,
    /// Output columns for table functions and loaders.
    pub table_columns: &'static [(&'static str, DataTypeId)],
}

impl FunctionDef {
    pub const fn new(signature: Signature, return_rule: ReturnRule) -> Self {
        FunctionDef {
            signature,
            return_rule,
            table_columns: &[],
        }
    }

    /// Overload with a fixed return type matching the signature's.
    pub const fn fixed(signature: Signature) -> Self {
        FunctionDef {
            signature,
            return_rule: ReturnRule::Fixed(signature.return_type),
            table_columns: &[],
        }
    }

    pub const fn table(
        signature: Signature,
        columns: &'static [(&'static str, DataTypeId)],
    ) -> Self {
        FunctionDef {
            signature,
            return_rule: ReturnRule::Fixed(DataTypeId::Null),
            table_columns: columns,
        }
    }
}

/// All overloads sharing a name.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSet {
    /// Name of the function.
    pub name: &'static str,
    /// Set of aliases for this function.
    pub aliases: &'static [&'static str],
    pub kind: FunctionKind,
    /// Binary functions where swapping the arguments doesn't change the
    /// result.
    pub commutative: bool,
    /// The function implementations.
    pub functions: &'static [FunctionDef],
}

impl FunctionSet {
    /// Get a reference to a function that has an exact signature match for the
    /// given positional inputs.
    ///
    /// If no signatures match (e.g. incorrect number of args, or args need to
    /// be casted), None will be returned.
    pub fn find_exact(&self, inputs: &[DataType]) -> Option<usize> {
        self.functions
            .iter()
            .position(|func| func.signature.exact_match(inputs))
    }

    /// Get the function at the given index.
    pub fn get(&self, idx: usize) -> Option<&FunctionDef> {
        self.functions.get(idx)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

impl PartialEq for FunctionSet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

/// A function with its overload picked and inputs cast.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFunction {
    pub name: &'static str,
    pub kind: FunctionKind,
    pub signature: Signature,
    pub return_type: DataType,
    pub inputs: Vec<Expression>,
}

impl PlannedFunction {
    /// Build a planned function directly from a set and its overload.
    ///
    /// Input types must already satisfy the overload.
    pub fn from_def(set: &FunctionSet, def: &FunctionDef, inputs: Vec<Expression>) -> Result<Self> {
        let types: Vec<_> = inputs.iter().map(|e| e.datatype()).collect();
        let return_type = def.return_rule.return_type(&types)?;
        Ok(PlannedFunction {
            name: set.name,
            kind: set.kind,
            signature: def.signature,
            return_type,
            inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_variadic_any() {
        let sig = Signature::new_variadic(&[], DataTypeId::Any, DataTypeId::Any);
        assert!(sig.exact_match(&[]));
        assert!(!sig.exact_match(&[DataType::Int32]));
    }

    #[test]
    fn exact_match_positional() {
        let sig = Signature::new(&[DataTypeId::Int32, DataTypeId::Any], DataTypeId::Int32);
        assert!(sig.exact_match(&[DataType::Int32, DataType::UTF8]));
        assert!(!sig.exact_match(&[DataType::Int64, DataType::UTF8]));
        assert!(!sig.exact_match(&[DataType::Int32]));
    }

    #[test]
    fn kind_satisfies() {
        assert!(FunctionKind::Filter.satisfies(FunctionKind::Scalar));
        assert!(FunctionKind::Aggregate.satisfies(FunctionKind::Window));
        assert!(!FunctionKind::Window.satisfies(FunctionKind::Aggregate));
        assert!(!FunctionKind::Scalar.satisfies(FunctionKind::Aggregate));
    }

    #[test]
    fn sum_return_type() {
        assert_eq!(
            DataType::Int64,
            ReturnRule::Sum.return_type(&[DataType::Int32]).unwrap()
        );
        assert_eq!(
            DataType::Decimal128(DecimalTypeMeta::new(38, 2)),
            ReturnRule::Sum
                .return_type(&[DataType::Decimal64(DecimalTypeMeta::new(10, 2))])
                .unwrap()
        );
    }
}
