//! Picking a single overload out of a function set.
use std::sync::Arc;

use quarry_error::{DbError, Result};
use tracing::trace;

use super::candidate::{CandidateSignature, CastType};
use super::implicit::ImplicitCastConfig;
use super::{FunctionDef, FunctionKind, FunctionSet, PlannedFunction};
use crate::catalog::entry::{CatalogEntryKind, FunctionEntry};
use crate::catalog::{Catalog, missing_entry_error};
use crate::config::session::SessionIdentity;
use crate::expr::Expression;
use crate::expr::cast_expr::check_type;
use crate::types::datatype::{DataType, DataTypeId};
use crate::types::supertype::supertype_of;

/// An overload along with the casts needed to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverload {
    pub set: &'static FunctionSet,
    pub def_idx: usize,
    /// Target type per argument, None if the argument is used as is.
    ///
    /// When `swapped` is set, these are in swapped order.
    pub casts: Vec<Option<DataType>>,
    /// The two arguments of a commutative function need to be swapped.
    pub swapped: bool,
}

impl ResolvedOverload {
    pub fn def(&self) -> Result<&'static FunctionDef> {
        self.set.functions.get(self.def_idx).ok_or_else(|| {
            DbError::new(format!(
                "Overload index {} out of range for '{}'",
                self.def_idx, self.set.name
            ))
        })
    }

    /// Cast the inputs as needed and build the planned function.
    ///
    /// Inputs are given in call order, they're swapped here if resolution
    /// needed to swap them.
    pub fn plan(&self, mut inputs: Vec<Expression>) -> Result<PlannedFunction> {
        if inputs.len() != self.casts.len() {
            return Err(DbError::new(format!(
                "Expected {} inputs for '{}', got {}",
                self.casts.len(),
                self.set.name,
                inputs.len()
            )));
        }
        if self.swapped {
            inputs.swap(0, 1);
        }

        let inputs = inputs
            .into_iter()
            .zip(&self.casts)
            .map(|(input, cast)| match cast {
                Some(target) => check_type(target, input),
                None => Ok(input),
            })
            .collect::<Result<Vec<_>>>()?;

        PlannedFunction::from_def(self.set, self.def()?, inputs)
    }
}

/// Resolve and plan a call to a builtin set, bypassing catalog lookups.
///
/// Used for functions the binder introduces on its own.
pub fn plan_builtin(set: &'static FunctionSet, inputs: Vec<Expression>) -> Result<PlannedFunction> {
    let types: Vec<_> = inputs.iter().map(|e| e.datatype()).collect();
    let resolved = resolve_in_set(set, &types, ImplicitCastConfig::FUNCTION)?
        .ok_or_else(|| no_matching_overload(set, &types))?;
    resolved.plan(inputs)
}

/// Resolve an overload within a single set.
///
/// Exact matches are preferred. Otherwise the highest scoring candidate wins,
/// ties going to the earlier overload. Commutative binary functions are
/// retried with their arguments swapped if nothing matches.
pub fn resolve_in_set(
    set: &'static FunctionSet,
    arg_types: &[DataType],
    conf: ImplicitCastConfig,
) -> Result<Option<ResolvedOverload>> {
    if let Some(resolved) = resolve_ordered(set, arg_types, conf, false)? {
        return Ok(Some(resolved));
    }

    if set.commutative {
        if let [left, right] = arg_types {
            let swapped = [right.clone(), left.clone()];
            return resolve_ordered(set, &swapped, conf, true);
        }
    }

    Ok(None)
}

fn resolve_ordered(
    set: &'static FunctionSet,
    arg_types: &[DataType],
    conf: ImplicitCastConfig,
    swapped: bool,
) -> Result<Option<ResolvedOverload>> {
    if let Some(def_idx) = set.find_exact(arg_types) {
        trace!(function = set.name, def_idx, swapped, "exact overload match");
        return Ok(Some(ResolvedOverload {
            set,
            def_idx,
            casts: vec![None; arg_types.len()],
            swapped,
        }));
    }

    let candidates = CandidateSignature::find_candidates(
        arg_types,
        set.functions.iter().map(|f| &f.signature),
        conf,
    );
    let best = match candidates.into_iter().next() {
        Some(best) => best,
        None => return Ok(None),
    };

    let def = set
        .functions
        .get(best.signature_idx)
        .ok_or_else(|| DbError::new("Candidate signature index out of range"))?;
    let sig = &def.signature;

    // Variadic `Any` arguments unify to their common type.
    let variadic_target = match sig.variadic_arg {
        Some(DataTypeId::Any) if arg_types.len() > sig.positional_args.len() => {
            Some(supertype_of(&arg_types[sig.positional_args.len()..])?)
        }
        _ => None,
    };

    let mut casts = Vec::with_capacity(arg_types.len());
    for (idx, (cast, have)) in best.casts.iter().zip(arg_types).enumerate() {
        let target = match cast {
            CastType::Cast { to, .. } => Some(have.cast_target(*to)?),
            CastType::NoCastNeeded => match &variadic_target {
                Some(target) if idx >= sig.positional_args.len() && target != have => {
                    Some(target.clone())
                }
                _ => None,
            },
        };
        casts.push(target);
    }

    trace!(
        function = set.name,
        def_idx = best.signature_idx,
        score = best.score,
        swapped,
        "resolved overload through implicit casts"
    );

    Ok(Some(ResolvedOverload {
        set,
        def_idx: best.signature_idx,
        casts,
        swapped,
    }))
}

/// Looks up functions in the catalog along the session's search path.
#[derive(Debug, Clone, Copy)]
pub struct FunctionLookup<'a> {
    pub catalog: &'a dyn Catalog,
    pub session: &'a SessionIdentity,
    /// Searched after the session schema.
    pub fallback_schema: &'a str,
}

impl<'a> FunctionLookup<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        session: &'a SessionIdentity,
        fallback_schema: &'a str,
    ) -> Self {
        FunctionLookup {
            catalog,
            session,
            fallback_schema,
        }
    }

    /// Find a function set by name, checking execute privileges.
    ///
    /// Returns the schema the function was found in along with the entry.
    pub fn find_set(&self, schema: Option<&str>, name: &str) -> Result<(String, Arc<FunctionEntry>)> {
        let search: Vec<&str> = match schema {
            Some(schema) => vec![schema],
            None => vec![self.session.schema.as_str(), self.fallback_schema],
        };

        for schema in &search {
            if let Some(entry) = self.catalog.get_function(schema, name)? {
                if !self
                    .catalog
                    .execute_priv(self.session, schema, entry.set.name)?
                {
                    return Err(DbError::privilege_denied(format!(
                        "Permission denied for function '{name}'"
                    ))
                    .with_field("function", name)
                    .with_field("user", &self.session.user));
                }
                return Ok((schema.to_string(), entry));
            }
        }

        let suggest_in = schema.unwrap_or(self.fallback_schema);
        Err(missing_entry_error(
            self.catalog,
            Some(suggest_in),
            CatalogEntryKind::Function,
            name,
        ))
    }

    /// Resolve a function of a specific kind for the given argument types.
    pub fn resolve_overload(
        &self,
        schema: Option<&str>,
        name: &str,
        arg_types: &[DataType],
        kind: FunctionKind,
    ) -> Result<ResolvedOverload> {
        let (_, entry) = self.find_set(schema, name)?;
        let set = entry.set;

        if !set.kind.satisfies(kind) {
            return Err(DbError::not_found(format!(
                "No {kind} named '{name}', '{}' is a {}",
                set.name, set.kind
            ))
            .with_field("function", name));
        }

        match resolve_in_set(set, arg_types, ImplicitCastConfig::FUNCTION)? {
            Some(resolved) => Ok(resolved),
            None => Err(no_matching_overload(set, arg_types)),
        }
    }
}

/// Error for a set that exists but has no overload for the inputs.
pub fn no_matching_overload(set: &FunctionSet, arg_types: &[DataType]) -> DbError {
    let types: Vec<_> = arg_types.iter().map(|t| t.to_string()).collect();
    let sigs: Vec<_> = set
        .functions
        .iter()
        .map(|f| format!("{}{}", set.name, f.signature))
        .collect();
    DbError::not_found(format!(
        "No function matches '{}({})'. You may need to add explicit type casts.\n    Candidates:\n        {}",
        set.name,
        types.join(", "),
        sigs.join("\n        "),
    ))
    .with_field("function", set.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::functions::builtin::aggregate::FUNCTION_SET_SUM;
    use crate::functions::builtin::arith::FUNCTION_SET_ADD;
    use crate::functions::builtin::conditional::FUNCTION_SET_COALESCE;

    #[test]
    fn exact_match_has_no_casts() {
        let resolved = resolve_in_set(
            &FUNCTION_SET_ADD,
            &[DataType::Int32, DataType::Int32],
            ImplicitCastConfig::FUNCTION,
        )
        .unwrap()
        .unwrap();
        assert_eq!(vec![None, None], resolved.casts);
        assert!(!resolved.swapped);
    }

    #[test]
    fn widen_to_common_integer() {
        let resolved = resolve_in_set(
            &FUNCTION_SET_ADD,
            &[DataType::Int32, DataType::Int64],
            ImplicitCastConfig::FUNCTION,
        )
        .unwrap()
        .unwrap();
        assert_eq!(vec![Some(DataType::Int64), None], resolved.casts);
    }

    #[test]
    fn commutative_swap() {
        let resolved = resolve_in_set(
            &FUNCTION_SET_ADD,
            &[DataType::Int32, DataType::Date32],
            ImplicitCastConfig::FUNCTION,
        )
        .unwrap()
        .unwrap();
        assert!(resolved.swapped);
        assert_eq!(vec![None, None], resolved.casts);
    }

    #[test]
    fn variadic_any_unifies() {
        let resolved = resolve_in_set(
            &FUNCTION_SET_COALESCE,
            &[DataType::Int32, DataType::Int64],
            ImplicitCastConfig::FUNCTION,
        )
        .unwrap()
        .unwrap();
        assert_eq!(vec![None, Some(DataType::Int64)], resolved.casts);
    }

    #[test]
    fn no_overload() {
        let resolved = resolve_in_set(
            &FUNCTION_SET_SUM,
            &[DataType::Boolean],
            ImplicitCastConfig::FUNCTION,
        )
        .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn lookup_falls_back_to_system_schema() {
        let catalog = MemoryCatalog::new();
        let session = MemoryCatalog::superuser_session();
        let lookup = FunctionLookup::new(&catalog, &session, "sys");

        let resolved = lookup
            .resolve_overload(None, "sum", &[DataType::Int32], FunctionKind::Aggregate)
            .unwrap();
        assert_eq!("sum", resolved.set.name);
    }

    #[test]
    fn lookup_misspelled_suggests() {
        let catalog = MemoryCatalog::new();
        let session = MemoryCatalog::superuser_session();
        let lookup = FunctionLookup::new(&catalog, &session, "sys");

        let err = lookup
            .resolve_overload(None, "summ", &[DataType::Int32], FunctionKind::Aggregate)
            .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::NotFound, err.kind());
        assert!(err.get_msg().contains("did you mean 'sum'"), "{err}");
    }

    #[test]
    fn lookup_wrong_kind() {
        let catalog = MemoryCatalog::new();
        let session = MemoryCatalog::superuser_session();
        let lookup = FunctionLookup::new(&catalog, &session, "sys");

        let err = lookup
            .resolve_overload(None, "lower", &[DataType::UTF8], FunctionKind::Aggregate)
            .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::NotFound, err.kind());
    }
}
