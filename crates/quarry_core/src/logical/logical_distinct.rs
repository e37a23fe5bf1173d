use super::operator::impl_passthrough_node;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

/// DISTINCTs all input rows.
///
/// Does not introduce a new table ref.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDistinct;

impl Explainable for LogicalDistinct {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Distinct")
    }
}

impl_passthrough_node!(LogicalDistinct, "Distinct");
