use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Passes through child rows whose predicate is true. FALSE and NULL drop
/// the row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalFilter {
    pub filter: Expression,
}

impl LogicalFilter {
    /// Filter on the AND of `conjuncts`. None if there's nothing to filter
    /// on.
    pub fn from_conjuncts(conjuncts: Vec<Expression>) -> Result<Option<Self>> {
        Ok(Expression::and_all(conjuncts)?.map(|filter| LogicalFilter { filter }))
    }
}

impl Explainable for LogicalFilter {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Filter", conf)
            .with_contextual_value("predicate", &self.filter)
            .with_value_if_verbose("correlated", self.filter.is_correlated())
            .build()
    }
}

impl LogicalNode for Node<LogicalFilter> {
    fn name(&self) -> &'static str {
        "Filter"
    }

    /// Same tables as the child, filtering doesn't change the columns.
    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.get_children_table_refs(bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.filter)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::context_display::ContextDisplayMode;
    use crate::expr::column_expr::{ColumnExpr, ColumnReference};
    use crate::expr::lit;
    use crate::types::datatype::DataType;

    #[test]
    fn no_conjuncts_no_filter() {
        assert_eq!(None, LogicalFilter::from_conjuncts(Vec::new()).unwrap());
    }

    #[test]
    fn single_conjunct_kept_as_is() {
        let filter = LogicalFilter::from_conjuncts(vec![lit(true)]).unwrap().unwrap();
        assert_eq!(lit(true), filter.filter);
    }

    #[test]
    fn verbose_explain_marks_correlation() {
        let outer = ColumnExpr::new(ColumnReference::new(TableRef { table_idx: 0 }, 0), DataType::Boolean).with_depth(1);
        let filter = LogicalFilter {
            filter: Expression::Column(outer),
        };
        let conf = ExplainConfig {
            context_mode: ContextDisplayMode::Raw,
            verbose: true,
        };
        let entry = filter.explain_entry(conf);
        assert_eq!(Some("true".to_string()), entry.items.get("correlated").map(|v| v.to_string()));

        let entry = filter.explain_entry(ExplainConfig::RAW);
        assert!(!entry.items.contains_key("correlated"));
    }
}
