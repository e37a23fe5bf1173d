use std::fmt;

use super::Expression;
use super::scalar_function_expr::fmt_function_call;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::functions::PlannedFunction;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    /// The function along with its inputs.
    pub agg: PlannedFunction,
    /// Only aggregate distinct input values.
    pub distinct: bool,
    /// Optional filter to the aggregate.
    pub filter: Option<Box<Expression>>,
}

impl ContextDisplay for AggregateExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        fmt_function_call(self.agg.name, &self.agg.inputs, mode, f)?;

        if let Some(filter) = self.filter.as_ref() {
            write!(
                f,
                " FILTER (WHERE {})",
                ContextDisplayWrapper::with_mode(filter.as_ref(), mode)
            )?;
        }

        Ok(())
    }
}
