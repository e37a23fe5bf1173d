use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};

/// One node of an explained plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainEntry {
    pub name: String,
    /// Sorted by key so output is stable.
    pub items: BTreeMap<String, ExplainValue>,
}

impl ExplainEntry {
    pub fn new(name: impl Into<String>) -> Self {
        ExplainEntry {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.items.is_empty() {
            return Ok(());
        }
        let items: Vec<_> = self
            .items
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect();
        write!(f, " ({})", items.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Values(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExplainConfig<'a> {
    pub context_mode: ContextDisplayMode<'a>,
    pub verbose: bool,
}

impl ExplainConfig<'_> {
    pub const RAW: Self = ExplainConfig {
        context_mode: ContextDisplayMode::Raw,
        verbose: false,
    };
}

/// Builds an [`ExplainEntry`] with values rendered for a config.
#[derive(Debug)]
pub struct EntryBuilder<'a> {
    conf: ExplainConfig<'a>,
    entry: ExplainEntry,
}

impl<'a> EntryBuilder<'a> {
    pub fn new(name: impl Into<String>, conf: ExplainConfig<'a>) -> Self {
        EntryBuilder {
            conf,
            entry: ExplainEntry::new(name),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.entry
            .items
            .insert(key.into(), ExplainValue::Value(value.to_string()));
        self
    }

    pub fn with_value_if_verbose(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        if self.conf.verbose {
            self.with_value(key, value)
        } else {
            self
        }
    }

    /// Add a value rendered using the bind context.
    ///
    /// Verbose explains also include the raw form under `<key>_raw`.
    pub fn with_contextual_value(self, key: impl Into<String>, value: impl ContextDisplay) -> Self {
        let key = key.into();
        let mode = self.conf.context_mode;
        let raw = self.conf.verbose && matches!(mode, ContextDisplayMode::Enriched(_));

        let rendered = ContextDisplayWrapper::with_mode(&value, mode).to_string();
        let mut this = self.with_value(key.clone(), rendered);
        if raw {
            let raw_val = ContextDisplayWrapper::with_mode(&value, ContextDisplayMode::Raw).to_string();
            this = this.with_value(format!("{key}_raw"), raw_val);
        }
        this
    }

    pub fn with_values<S: fmt::Display>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.entry
            .items
            .insert(key.into(), ExplainValue::Values(values));
        self
    }

    pub fn with_values_if_verbose<S: fmt::Display>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        if self.conf.verbose {
            self.with_values(key, values)
        } else {
            self
        }
    }

    pub fn with_contextual_values<S: ContextDisplay>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let mode = self.conf.context_mode;
        let rendered: Vec<_> = values
            .into_iter()
            .map(|v| ContextDisplayWrapper::with_mode(v, mode).to_string())
            .collect();
        self.with_values(key, rendered)
    }

    pub fn build(self) -> ExplainEntry {
        self.entry
    }
}

/// Produce an explain entry for a single node in a plan.
pub trait Explainable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}

/// Column indexes formatted as `#0, #2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndexes<'a>(pub &'a [usize]);

impl fmt::Display for ColumnIndexes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<_> = self.0.iter().map(|c| format!("#{c}")).collect();
        write!(f, "{}", cols.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_display_no_values() {
        let ent = EntryBuilder::new("Dummy", ExplainConfig::RAW).build();
        assert_eq!("Dummy", ent.to_string());
    }

    #[test]
    fn entry_display_with_values() {
        let ent = EntryBuilder::new("Dummy", ExplainConfig::RAW)
            .with_value("k1", "v1")
            .with_values("k2", ["a", "b"])
            .with_value_if_verbose("hidden", "x")
            .build();
        assert_eq!("Dummy (k1 = v1, k2 = [a, b])", ent.to_string());
    }

    #[test]
    fn column_indexes() {
        assert_eq!("#0, #3", ColumnIndexes(&[0, 3]).to_string());
    }
}
