use std::fmt;

use super::Expression;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};

/// `<expr> [NOT] IN (<list>)`
///
/// All list entries have the same type as `expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct InListExpr {
    pub expr: Box<Expression>,
    pub list: Vec<Expression>,
    pub negated: bool,
}

impl ContextDisplay for InListExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let list: Vec<_> = self
            .list
            .iter()
            .map(|e| ContextDisplayWrapper::with_mode(e, mode).to_string())
            .collect();
        write!(
            f,
            "{}{} IN ({})",
            ContextDisplayWrapper::with_mode(self.expr.as_ref(), mode),
            if self.negated { " NOT" } else { "" },
            list.join(", ")
        )
    }
}
