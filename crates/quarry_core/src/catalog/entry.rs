use std::fmt;

use quarry_ast::ast;

use crate::functions::FunctionSet;
use crate::types::datatype::DataType;

/// Name of the hidden row identifier column present on every base table.
pub const ROW_ID_COLUMN: &str = "%rowid";

/// Kinds of named objects, used for error messages and similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogEntryKind {
    Schema,
    Table,
    View,
    Sequence,
    Type,
    Index,
    Trigger,
    Function,
    User,
    Role,
}

impl fmt::Display for CatalogEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
            Self::Sequence => write!(f, "sequence"),
            Self::Type => write!(f, "type"),
            Self::Index => write!(f, "index"),
            Self::Trigger => write!(f, "trigger"),
            Self::Function => write!(f, "function"),
            Self::User => write!(f, "user"),
            Self::Role => write!(f, "role"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub name: String,
    pub owner: String,
    /// System schemas can't be dropped or renamed.
    pub system: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    pub datatype: DataType,
    pub not_null: bool,
    /// Default expression, bound again each time it's used.
    pub default: Option<ast::Expr>,
    /// Hidden columns aren't expanded by `*`.
    pub hidden: bool,
}

impl ColumnEntry {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        ColumnEntry {
            name: name.into(),
            datatype,
            not_null: false,
            default: None,
            hidden: false,
        }
    }

    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn row_id() -> Self {
        ColumnEntry {
            name: ROW_ID_COLUMN.to_string(),
            datatype: DataType::RowId,
            not_null: true,
            default: None,
            hidden: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    PrimaryKey(Vec<usize>),
    Unique(Vec<usize>),
    ForeignKey {
        columns: Vec<usize>,
        ref_schema: String,
        ref_table: String,
        ref_columns: Vec<usize>,
        on_delete: ast::ReferentialAction,
        on_update: ast::ReferentialAction,
    },
    Check(ast::Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintEntry {
    pub name: String,
    pub kind: ConstraintKind,
}

impl ConstraintEntry {
    /// Columns making up a key constraint.
    pub fn key_columns(&self) -> Option<&[usize]> {
        match &self.kind {
            ConstraintKind::PrimaryKey(cols) | ConstraintKind::Unique(cols) => Some(cols),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableKind {
    Base,
    View {
        query: ast::QueryNode,
        column_aliases: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub name: String,
    pub schema: String,
    pub columns: Vec<ColumnEntry>,
    pub constraints: Vec<ConstraintEntry>,
    pub kind: TableKind,
    pub system: bool,
    pub temp: bool,
}

impl TableEntry {
    pub fn is_view(&self) -> bool {
        matches!(self.kind, TableKind::View { .. })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = (usize, &ColumnEntry)> {
        self.columns.iter().enumerate().filter(|(_, c)| !c.hidden)
    }

    pub fn row_id_column(&self) -> Option<usize> {
        self.column_index(ROW_ID_COLUMN)
    }

    pub fn primary_key(&self) -> Option<&[usize]> {
        self.constraints.iter().find_map(|c| match &c.kind {
            ConstraintKind::PrimaryKey(cols) => Some(cols.as_slice()),
            _ => None,
        })
    }

    /// Check if `columns` exactly matches a primary key or unique constraint.
    pub fn is_key(&self, columns: &[usize]) -> bool {
        self.constraints.iter().any(|c| match c.key_columns() {
            Some(key) => {
                key.len() == columns.len() && key.iter().all(|col| columns.contains(col))
            }
            None => false,
        })
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ConstraintEntry> {
        self.constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::ForeignKey { .. }))
    }

    pub fn find_constraint(&self, name: &str) -> Option<&ConstraintEntry> {
        self.constraints.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hash,
    /// Order preserving index.
    Ordered,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => write!(f, "hash"),
            Self::Ordered => write!(f, "ordered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<usize>,
    pub kind: IndexKind,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceEntry {
    pub name: String,
    pub schema: String,
    pub datatype: DataType,
    pub start: i64,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub cycle: bool,
    pub cache: i64,
}

/// User defined alias for a type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    pub name: String,
    pub schema: String,
    pub datatype: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEntry {
    pub name: String,
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    pub schema: String,
    pub set: &'static FunctionSet,
    pub system: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserEntry {
    pub name: String,
    pub full_name: Option<String>,
    pub default_schema: String,
    pub default_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleEntry {
    pub name: String,
    pub admin: Option<String>,
}
