use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::types::datatype::DataType;

/// Computes a new set of columns from the child.
///
/// Only `projection_table` is visible above this node. Column `i` of that
/// table is the value of `projections[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalProject {
    pub projections: Vec<Expression>,
    pub projection_table: TableRef,
}

impl LogicalProject {
    pub fn column_types(&self) -> Vec<DataType> {
        self.projections.iter().map(|p| p.datatype()).collect()
    }
}

impl Explainable for LogicalProject {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Project", conf)
            .with_contextual_values("projections", &self.projections)
            .with_values_if_verbose("types", self.column_types())
            .with_value_if_verbose("table_ref", self.projection_table)
            .build()
    }
}

impl LogicalNode for Node<LogicalProject> {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        vec![self.node.projection_table]
    }

    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        self.node.projections.iter().try_for_each(func)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        self.node.projections.iter_mut().try_for_each(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::context_display::ContextDisplayMode;
    use crate::expr::lit;

    fn project() -> LogicalProject {
        LogicalProject {
            projections: vec![lit(1_i32), lit("a")],
            projection_table: TableRef { table_idx: 3 },
        }
    }

    #[test]
    fn column_types_follow_projections() {
        assert_eq!(
            vec![DataType::Int32, DataType::Utf8 { max_length: Some(1) }],
            project().column_types()
        );
    }

    #[test]
    fn verbose_explain_lists_types() {
        let conf = ExplainConfig {
            context_mode: ContextDisplayMode::Raw,
            verbose: true,
        };
        let entry = project().explain_entry(conf);
        assert!(entry.items.contains_key("types"), "{entry}");
        assert!(entry.items.contains_key("table_ref"), "{entry}");

        let entry = project().explain_entry(ExplainConfig::RAW);
        assert_eq!(vec!["projections"], entry.items.keys().collect::<Vec<_>>());
    }
}
