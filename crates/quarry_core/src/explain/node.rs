use std::fmt::Write as _;

use quarry_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use super::context_display::ContextDisplayMode;
use super::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::logical::binder::bind_context::BindContext;
use crate::logical::operator::LogicalOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExplainFormat {
    #[default]
    Text,
    Json,
}

/// A plan node along with its explained children.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExplainNode {
    pub entry: ExplainEntry,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new_from_logical(verbose: bool, bind_context: &BindContext, root: &LogicalOperator) -> Self {
        let config = ExplainConfig {
            context_mode: ContextDisplayMode::Enriched(bind_context),
            verbose,
        };
        Self::walk_logical(config, root)
    }

    pub fn walk_logical(config: ExplainConfig, plan: &LogicalOperator) -> Self {
        let entry = plan.explain_entry(config);
        let children = plan
            .children()
            .iter()
            .map(|c| Self::walk_logical(config, c))
            .collect();

        ExplainNode { entry, children }
    }

    pub fn format(&self, format: ExplainFormat) -> Result<String> {
        match format {
            ExplainFormat::Text => Ok(self.format_text()),
            ExplainFormat::Json => serde_json::to_string_pretty(self).map_err(|e| {
                DbError::new("Failed to serialize explain output").with_source(Box::new(e))
            }),
        }
    }

    /// One entry per line, children indented below their parent.
    pub fn format_text(&self) -> String {
        let mut buf = String::new();
        self.write_text(0, &mut buf);
        buf
    }

    fn write_text(&self, indent: usize, buf: &mut String) {
        // Writing to a String doesn't fail.
        let _ = writeln!(buf, "{}{}", "  ".repeat(indent), self.entry);
        for child in &self.children {
            child.write_text(indent + 1, buf);
        }
    }
}
