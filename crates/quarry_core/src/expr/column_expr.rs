use std::fmt;

use crate::explain::context_display::{ContextDisplay, ContextDisplayMode};
use crate::logical::binder::bind_context::TableRef;
use crate::types::datatype::DataType;

/// Reference to a column of a table in the bind context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnReference {
    pub table_scope: TableRef,
    pub column: usize,
}

impl ColumnReference {
    pub fn new(table_scope: TableRef, column: usize) -> Self {
        ColumnReference {
            table_scope,
            column,
        }
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_scope, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnExpr {
    pub reference: ColumnReference,
    pub datatype: DataType,
    /// Number of scopes up this column was resolved in. Zero for columns
    /// bound in the scope the expression lives in.
    pub depth: usize,
}

impl ColumnExpr {
    pub fn new(reference: ColumnReference, datatype: DataType) -> Self {
        ColumnExpr {
            reference,
            datatype,
            depth: 0,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_correlated(&self) -> bool {
        self.depth > 0
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)?;
        if self.depth > 0 {
            write!(f, "^{}", self.depth)?;
        }
        Ok(())
    }
}

impl ContextDisplay for ColumnExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match mode {
            ContextDisplayMode::Enriched(context) => {
                match context.get_column(self.reference.table_scope, self.reference.column) {
                    Ok((name, _)) if self.depth > 0 => write!(f, "{name}^{}", self.depth),
                    Ok((name, _)) => write!(f, "{name}"),
                    Err(_) => write!(f, "<missing! {self}>"),
                }
            }
            ContextDisplayMode::Raw => write!(f, "{self}"),
        }
    }
}
