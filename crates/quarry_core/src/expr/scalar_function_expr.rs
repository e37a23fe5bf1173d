use std::fmt;

use super::Expression;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::functions::PlannedFunction;

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFunctionExpr {
    pub function: PlannedFunction,
}

/// Operators printed infix between their arguments.
const INFIX: &[&str] = &["+", "-", "*", "/", "%", "||", "&", "|", "^", "<<", ">>", "and", "or"];

impl ContextDisplay for ScalarFunctionExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt_function_call(self.function.name, &self.function.inputs, mode, f)
    }
}

pub(crate) fn fmt_function_call(
    name: &str,
    inputs: &[Expression],
    mode: ContextDisplayMode,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    if INFIX.contains(&name) && inputs.len() >= 2 {
        let sep = match name {
            "and" => " AND ",
            "or" => " OR ",
            other => return fmt_infix(other, inputs, mode, f),
        };
        return write!(f, "({})", join(inputs, mode, sep));
    }

    write!(f, "{name}({})", join(inputs, mode, ", "))
}

fn fmt_infix(
    op: &str,
    inputs: &[Expression],
    mode: ContextDisplayMode,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let sep = format!(" {op} ");
    write!(f, "{}", join(inputs, mode, &sep))
}

fn join(inputs: &[Expression], mode: ContextDisplayMode, sep: &str) -> String {
    inputs
        .iter()
        .map(|input| ContextDisplayWrapper::with_mode(input, mode).to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
