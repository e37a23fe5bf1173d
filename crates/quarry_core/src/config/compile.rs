use std::collections::HashMap;
use std::sync::LazyLock;

use quarry_error::{DbError, Result};

use crate::types::scalar::ScalarValue;

/// Limits and toggles for a single compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileConfig {
    /// Max nesting of expressions before giving up.
    pub max_expression_depth: usize,
    /// IN lists with at most this many literals are rewritten to an OR chain
    /// of equalities when used as a predicate.
    pub in_list_rewrite_threshold: usize,
    pub enable_in_list_rewrite: bool,
    /// Max number of grouping sets after expanding ROLLUP/CUBE.
    pub max_grouping_sets: usize,
    /// Schema searched after the session schema.
    pub default_schema_fallback: String,
    /// Check plan invariants after planning.
    pub verify_plans: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        CompileConfig {
            max_expression_depth: 256,
            in_list_rewrite_threshold: 8,
            enable_in_list_rewrite: true,
            max_grouping_sets: 4096,
            default_schema_fallback: "sys".to_string(),
            verify_plans: cfg!(debug_assertions),
        }
    }
}

impl CompileConfig {
    pub fn set_from_scalar(&mut self, name: &str, value: &ScalarValue) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::not_found(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::not_found(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let scalar = def_conf.get_as_scalar(name)?;
        self.set_from_scalar(name, &scalar)
    }

    /// Names and descriptions of all settings, sorted by name.
    pub fn settings() -> Vec<(&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
            .collect();
        settings.sort_unstable();
        settings
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()>,
    get: fn(conf: &CompileConfig) -> ScalarValue,
}

impl SettingFunctions {
    const fn new<S: CompileSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
        }
    }
}

fn insert_setting<S: CompileSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<MaxExpressionDepth>(&mut map);
    insert_setting::<InListRewriteThreshold>(&mut map);
    insert_setting::<EnableInListRewrite>(&mut map);
    insert_setting::<MaxGroupingSets>(&mut map);
    insert_setting::<DefaultSchemaFallback>(&mut map);
    insert_setting::<VerifyPlans>(&mut map);

    map
});

pub trait CompileSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()>;
    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue;
}

fn try_as_positive_usize(scalar: &ScalarValue, name: &str) -> Result<usize> {
    let val = scalar.try_as_i64()?;
    if val <= 0 {
        return Err(DbError::invalid_input(format!(
            "Setting '{name}' must be greater than zero, got {val}"
        )));
    }
    Ok(val as usize)
}

pub struct MaxExpressionDepth;

impl CompileSetting for MaxExpressionDepth {
    const NAME: &'static str = "max_expression_depth";
    const DESCRIPTION: &'static str = "Max nesting depth of expressions";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.max_expression_depth = try_as_positive_usize(scalar, Self::NAME)?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        (conf.max_expression_depth as i64).into()
    }
}

pub struct InListRewriteThreshold;

impl CompileSetting for InListRewriteThreshold {
    const NAME: &'static str = "in_list_rewrite_threshold";
    const DESCRIPTION: &'static str = "Max IN list size rewritten to a chain of comparisons";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.in_list_rewrite_threshold = try_as_positive_usize(scalar, Self::NAME)?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        (conf.in_list_rewrite_threshold as i64).into()
    }
}

pub struct EnableInListRewrite;

impl CompileSetting for EnableInListRewrite {
    const NAME: &'static str = "enable_in_list_rewrite";
    const DESCRIPTION: &'static str = "Controls if small IN lists are rewritten to comparisons";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.enable_in_list_rewrite = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        conf.enable_in_list_rewrite.into()
    }
}

pub struct MaxGroupingSets;

impl CompileSetting for MaxGroupingSets {
    const NAME: &'static str = "max_grouping_sets";
    const DESCRIPTION: &'static str = "Max grouping sets produced by ROLLUP, CUBE and GROUPING SETS";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.max_grouping_sets = try_as_positive_usize(scalar, Self::NAME)?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        (conf.max_grouping_sets as i64).into()
    }
}

pub struct DefaultSchemaFallback;

impl CompileSetting for DefaultSchemaFallback {
    const NAME: &'static str = "default_schema_fallback";
    const DESCRIPTION: &'static str = "Schema searched when a name isn't found in the session schema";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.default_schema_fallback = scalar.try_as_str()?.to_string();
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        conf.default_schema_fallback.clone().into()
    }
}

pub struct VerifyPlans;

impl CompileSetting for VerifyPlans {
    const NAME: &'static str = "verify_plans";
    const DESCRIPTION: &'static str = "Verify type and grouping invariants of compiled plans";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileConfig) -> Result<()> {
        conf.verify_plans = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileConfig) -> ScalarValue {
        conf.verify_plans.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_reset() {
        let mut conf = CompileConfig::default();
        conf.set_from_scalar("in_list_rewrite_threshold", &ScalarValue::Int32(3))
            .unwrap();
        assert_eq!(3, conf.in_list_rewrite_threshold);

        conf.reset("in_list_rewrite_threshold").unwrap();
        assert_eq!(8, conf.in_list_rewrite_threshold);
    }

    #[test]
    fn reject_non_positive() {
        let mut conf = CompileConfig::default();
        conf.set_from_scalar("max_expression_depth", &ScalarValue::Int64(0))
            .unwrap_err();
    }

    #[test]
    fn unknown_setting() {
        let conf = CompileConfig::default();
        conf.get_as_scalar("optimizer_level").unwrap_err();
    }

    #[test]
    fn all_settings_listed() {
        let names: Vec<_> = CompileConfig::settings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            vec![
                "default_schema_fallback",
                "enable_in_list_rewrite",
                "in_list_rewrite_threshold",
                "max_expression_depth",
                "max_grouping_sets",
                "verify_plans",
            ],
            names
        );
    }
}
