//! Builtin function sets registered in the system schema.

/// Shorthand for a signature in a const context.
///
/// `sig!([Int32, Int32] => Int32)`, `sig!([Utf8], ...Utf8 => Utf8)`
macro_rules! sig {
    ([$($arg:ident),*] => $ret:ident) => {
        $crate::functions::Signature::new(
            &[$($crate::types::datatype::DataTypeId::$arg),*],
            $crate::types::datatype::DataTypeId::$ret,
        )
    };
    ([$($arg:ident),*], ...$var:ident => $ret:ident) => {
        $crate::functions::Signature::new_variadic(
            &[$($crate::types::datatype::DataTypeId::$arg),*],
            $crate::types::datatype::DataTypeId::$var,
            $crate::types::datatype::DataTypeId::$ret,
        )
    };
}

pub mod aggregate;
pub mod arith;
pub mod boolean;
pub mod conditional;
pub mod internal;
pub mod string;
pub mod table;
pub mod window;

use super::FunctionSet;

/// All builtin function sets.
///
/// Order matters only for lookups by alias, the first set claiming a name
/// wins.
pub const BUILTIN_FUNCTION_SETS: &[FunctionSet] = &[
    // Arith
    arith::FUNCTION_SET_ADD,
    arith::FUNCTION_SET_SUB,
    arith::FUNCTION_SET_MUL,
    arith::FUNCTION_SET_DIV,
    arith::FUNCTION_SET_REM,
    arith::FUNCTION_SET_NEGATE,
    arith::FUNCTION_SET_ABS,
    arith::FUNCTION_SET_BIT_AND,
    arith::FUNCTION_SET_BIT_OR,
    arith::FUNCTION_SET_XOR,
    arith::FUNCTION_SET_SHL,
    arith::FUNCTION_SET_SHR,
    // Boolean
    boolean::FUNCTION_SET_AND,
    boolean::FUNCTION_SET_OR,
    boolean::FUNCTION_SET_NOT,
    boolean::FUNCTION_SET_IS_NULL,
    boolean::FUNCTION_SET_IS_NOT_NULL,
    boolean::FUNCTION_SET_IS_TRUE,
    boolean::FUNCTION_SET_IS_NOT_TRUE,
    boolean::FUNCTION_SET_IS_FALSE,
    boolean::FUNCTION_SET_IS_NOT_FALSE,
    // Conditional
    conditional::FUNCTION_SET_CASEWHEN,
    conditional::FUNCTION_SET_IFTHENELSE,
    conditional::FUNCTION_SET_COALESCE,
    conditional::FUNCTION_SET_NULLIF,
    // String
    string::FUNCTION_SET_CONCAT,
    string::FUNCTION_SET_LIKE,
    string::FUNCTION_SET_ILIKE,
    string::FUNCTION_SET_LOWER,
    string::FUNCTION_SET_UPPER,
    string::FUNCTION_SET_LENGTH,
    string::FUNCTION_SET_SUBSTRING,
    // Internal
    internal::FUNCTION_SET_DIFF,
    internal::FUNCTION_SET_WINDOW_BOUND,
    internal::FUNCTION_SET_HASH,
    internal::FUNCTION_SET_ROTATE_XOR_HASH,
    internal::FUNCTION_SET_NEXT_VALUE_FOR,
    internal::FUNCTION_SET_CURRENT_USER,
    internal::FUNCTION_SET_CURRENT_ROLE,
    internal::FUNCTION_SET_CURRENT_SCHEMA,
    // Aggregates
    aggregate::FUNCTION_SET_COUNT,
    aggregate::FUNCTION_SET_COUNT_STAR,
    aggregate::FUNCTION_SET_SUM,
    aggregate::FUNCTION_SET_AVG,
    aggregate::FUNCTION_SET_MIN,
    aggregate::FUNCTION_SET_MAX,
    // Window
    window::FUNCTION_SET_ROW_NUMBER,
    window::FUNCTION_SET_RANK,
    window::FUNCTION_SET_DENSE_RANK,
    window::FUNCTION_SET_PERCENT_RANK,
    window::FUNCTION_SET_CUME_DIST,
    window::FUNCTION_SET_NTILE,
    window::FUNCTION_SET_LAG,
    window::FUNCTION_SET_LEAD,
    window::FUNCTION_SET_FIRST_VALUE,
    window::FUNCTION_SET_LAST_VALUE,
    window::FUNCTION_SET_NTH_VALUE,
    // Table, loaders, procedures
    table::FUNCTION_SET_GENERATE_SERIES,
    table::FUNCTION_SET_CSV,
    table::FUNCTION_SET_VACUUM,
];

/// Find a builtin set by name or alias.
pub fn find_builtin(name: &str) -> Option<&'static FunctionSet> {
    BUILTIN_FUNCTION_SETS.iter().find(|set| set.matches_name(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn no_duplicate_names() {
        let mut seen = HashSet::new();
        for set in BUILTIN_FUNCTION_SETS {
            assert!(seen.insert(set.name), "duplicate name: {}", set.name);
            for &alias in set.aliases {
                assert!(seen.insert(alias), "duplicate alias: {alias}");
            }
        }
    }

    #[test]
    fn find_by_alias() {
        assert_eq!("+", find_builtin("add").unwrap().name);
        assert_eq!("%", find_builtin("mod").unwrap().name);
        assert!(find_builtin("not_a_function").is_none());
    }
}
