use std::fmt;

use crate::explain::context_display::{ContextDisplay, ContextDisplayMode};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub literal: ScalarValue,
}

impl LiteralExpr {
    pub fn new(literal: impl Into<ScalarValue>) -> Self {
        LiteralExpr {
            literal: literal.into(),
        }
    }

    pub fn datatype(&self) -> DataType {
        self.literal.datatype()
    }
}

impl ContextDisplay for LiteralExpr {
    fn fmt_using_context(
        &self,
        _mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.literal {
            ScalarValue::Utf8(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}
