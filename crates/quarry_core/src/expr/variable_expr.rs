use std::fmt;

use super::Expression;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::types::datatype::{DataType, StructTypeMeta};

/// A declared variable, either from a statement block or a session global.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableExpr {
    pub name: String,
    pub datatype: DataType,
    /// Session global rather than a block local.
    pub global: bool,
}

impl ContextDisplay for VariableExpr {
    fn fmt_using_context(
        &self,
        _mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.global {
            write!(f, "@@{}", self.name)
        } else {
            write!(f, "@{}", self.name)
        }
    }
}

/// A prepared statement parameter, typed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterExpr {
    /// `1`, `2`, ... for positional parameters.
    pub name: String,
    pub datatype: DataType,
}

impl ContextDisplay for ParameterExpr {
    fn fmt_using_context(
        &self,
        _mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "${}", self.name)
    }
}

/// Row constructor, `(a, b, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesExpr {
    pub values: Vec<Expression>,
}

impl ValuesExpr {
    pub fn datatype(&self) -> DataType {
        DataType::Struct(StructTypeMeta {
            fields: self
                .values
                .iter()
                .enumerate()
                .map(|(idx, v)| (format!("c{idx}"), v.datatype()))
                .collect(),
        })
    }
}

impl ContextDisplay for ValuesExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let values: Vec<_> = self
            .values
            .iter()
            .map(|e| ContextDisplayWrapper::with_mode(e, mode).to_string())
            .collect();
        write!(f, "ROW({})", values.join(", "))
    }
}
