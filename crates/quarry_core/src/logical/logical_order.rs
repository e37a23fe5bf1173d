use std::fmt;

use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node};
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expression,
    pub desc: bool,
    pub nulls_first: bool,
}

impl OrderByExpr {
    /// Ascending with nulls last, descending with nulls first.
    pub fn new(expr: Expression, desc: bool, nulls_first: Option<bool>) -> Self {
        OrderByExpr {
            expr,
            desc,
            nulls_first: nulls_first.unwrap_or(desc),
        }
    }
}

impl ContextDisplay for OrderByExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            ContextDisplayWrapper::with_mode(&self.expr, mode),
            if self.desc { "DESC" } else { "ASC" },
            if self.nulls_first {
                "NULLS FIRST"
            } else {
                "NULLS LAST"
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOrder {
    pub exprs: Vec<OrderByExpr>,
}

impl Explainable for LogicalOrder {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Order", conf)
            .with_contextual_values("expressions", &self.exprs)
            .build()
    }
}

impl LogicalNode for Node<LogicalOrder> {
    fn name(&self) -> &'static str {
        "Order"
    }

    fn get_output_table_refs(&self, bind_context: &BindContext) -> Vec<TableRef> {
        self.get_children_table_refs(bind_context)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for order in &self.node.exprs {
            func(&order.expr)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for order in &mut self.node.exprs {
            func(&mut order.expr)?;
        }
        Ok(())
    }
}
