use std::fmt;

use super::operator::impl_no_output_node;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::functions::PlannedFunction;

/// Text format settings for COPY, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFormat {
    pub delimiter: String,
    pub record_delimiter: String,
    pub quote: Option<String>,
    pub null_string: String,
    pub header: bool,
}

impl Default for CopyFormat {
    fn default() -> Self {
        CopyFormat {
            delimiter: "|".to_string(),
            record_delimiter: "\n".to_string(),
            quote: Some("\"".to_string()),
            null_string: "null".to_string(),
            header: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyLocation {
    Files(Vec<String>),
    Stdio,
}

impl fmt::Display for CopyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Files(files) => write!(f, "{}", files.join(", ")),
            Self::Stdio => write!(f, "STDIO"),
        }
    }
}

/// Bulk load into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalCopyFrom {
    pub schema: String,
    pub table: String,
    /// Table columns receiving loaded fields, in field order.
    pub columns: Vec<usize>,
    pub source: CopyLocation,
    /// Loader function replacing the builtin text reader.
    pub loader: Option<PlannedFunction>,
    pub format: CopyFormat,
    /// Rows to skip.
    pub offset: Option<i64>,
    pub record_count: Option<i64>,
    pub best_effort: bool,
}

impl Explainable for LogicalCopyFrom {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("CopyFrom", conf)
            .with_value("table", format!("{}.{}", self.schema, self.table))
            .with_value("source", &self.source)
            .with_value_if_verbose("delimiter", format!("{:?}", self.format.delimiter));
        if let Some(loader) = &self.loader {
            builder = builder.with_value("loader", loader.name);
        }
        builder.build()
    }
}

impl_no_output_node!(LogicalCopyFrom, "CopyFrom");

/// Write the output of the only child.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalCopyTo {
    pub target: CopyLocation,
    pub format: CopyFormat,
}

impl Explainable for LogicalCopyTo {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("CopyTo", conf)
            .with_value("target", &self.target)
            .with_value_if_verbose("delimiter", format!("{:?}", self.format.delimiter))
            .build()
    }
}

impl_no_output_node!(LogicalCopyTo, "CopyTo");
