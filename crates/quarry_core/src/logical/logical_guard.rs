use std::fmt;

use super::operator::{impl_no_output_node, impl_passthrough_node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

/// Runtime check on the number of rows flowing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// Error if the input produces more than one row. Used for scalar
    /// subqueries.
    MaxOneRow,
    /// Error if a target row is matched by more than one source row.
    MaxOneMatch,
    /// Error if the row count differs from the row count of the statement's
    /// source.
    RowCountUnchanged,
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxOneRow => write!(f, "MaxOneRow"),
            Self::MaxOneMatch => write!(f, "MaxOneMatch"),
            Self::RowCountUnchanged => write!(f, "RowCountUnchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCardinalityGuard {
    pub kind: GuardKind,
    /// Error message raised when the check fails.
    pub message: String,
}

impl LogicalCardinalityGuard {
    pub fn max_one_row() -> Self {
        LogicalCardinalityGuard {
            kind: GuardKind::MaxOneRow,
            message: "more than one row returned by a subquery used as an expression".to_string(),
        }
    }

    pub fn max_one_match(target: &str) -> Self {
        LogicalCardinalityGuard {
            kind: GuardKind::MaxOneMatch,
            message: format!("MERGE: a row of '{target}' was matched by more than one source row"),
        }
    }

    pub fn row_count_unchanged(target: &str) -> Self {
        LogicalCardinalityGuard {
            kind: GuardKind::RowCountUnchanged,
            message: format!("MERGE: source rows for '{target}' were duplicated"),
        }
    }
}

impl Explainable for LogicalCardinalityGuard {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("CardinalityGuard", conf)
            .with_value("kind", self.kind)
            .with_value_if_verbose("message", &self.message)
            .build()
    }
}

impl_passthrough_node!(LogicalCardinalityGuard, "CardinalityGuard");

/// Runs each child to completion in order. Children are side effecting
/// statements; nothing is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCascade {
    /// What the sequence of statements implements, e.g. "merge".
    pub label: String,
}

impl Explainable for LogicalCascade {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Cascade", conf)
            .with_value("label", &self.label)
            .build()
    }
}

impl_no_output_node!(LogicalCascade, "Cascade");
