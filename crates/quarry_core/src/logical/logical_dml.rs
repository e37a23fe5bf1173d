use std::fmt;

use quarry_ast::ast;

use super::operator::impl_no_output_node;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

/// A computed index key in the input of an insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeyColumn {
    pub index: String,
    /// Position of the key in the child's output.
    pub position: usize,
}

impl fmt::Display for IndexKeyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.position)
    }
}

/// A boolean column in the input that is true for rows violating a foreign
/// key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyCheck {
    pub constraint: String,
    pub position: usize,
    /// Position of the referenced row's id, NULL when there's no match.
    pub referenced_row: usize,
}

impl fmt::Display for ForeignKeyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.constraint, self.position)
    }
}

/// Insert rows produced by the only child.
///
/// The child's output begins with one column per entry in `columns`,
/// followed by index keys and foreign key checks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalInsert {
    pub schema: String,
    pub table: String,
    /// Target table column for each leading output column of the child.
    pub columns: Vec<usize>,
    pub index_keys: Vec<IndexKeyColumn>,
    pub fk_checks: Vec<ForeignKeyCheck>,
}

impl Explainable for LogicalInsert {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Insert", conf)
            .with_value("table", format!("{}.{}", self.schema, self.table))
            .with_values_if_verbose("columns", &self.columns);
        if !self.index_keys.is_empty() {
            builder = builder.with_values("index_keys", &self.index_keys);
        }
        if !self.fk_checks.is_empty() {
            builder = builder.with_values("fk_checks", &self.fk_checks);
        }
        builder.build()
    }
}

impl_no_output_node!(LogicalInsert, "Insert");

/// Update rows identified by the row id in the first child output column.
///
/// Output column `i + 1` holds the new value for `columns[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalUpdate {
    pub schema: String,
    pub table: String,
    pub columns: Vec<usize>,
    pub index_keys: Vec<IndexKeyColumn>,
    pub fk_checks: Vec<ForeignKeyCheck>,
}

impl Explainable for LogicalUpdate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Update", conf)
            .with_value("table", format!("{}.{}", self.schema, self.table))
            .with_values("columns", &self.columns);
        if !self.index_keys.is_empty() {
            builder = builder.with_values("index_keys", &self.index_keys);
        }
        if !self.fk_checks.is_empty() {
            builder = builder.with_values("fk_checks", &self.fk_checks);
        }
        builder.build()
    }
}

impl_no_output_node!(LogicalUpdate, "Update");

/// A table with a foreign key to the table rows are deleted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingTable {
    pub schema: String,
    pub table: String,
    pub constraint: String,
    pub on_delete: ast::ReferentialAction,
}

impl fmt::Display for ReferencingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({}, {:?})",
            self.schema, self.table, self.constraint, self.on_delete
        )
    }
}

/// Delete rows identified by the row id in the first child output column.
///
/// Index keys of the deleted rows follow the row id.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDelete {
    pub schema: String,
    pub table: String,
    pub index_keys: Vec<IndexKeyColumn>,
    /// Checked (or cascaded into) for every deleted row.
    pub referenced_by: Vec<ReferencingTable>,
}

impl Explainable for LogicalDelete {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Delete", conf)
            .with_value("table", format!("{}.{}", self.schema, self.table));
        if !self.index_keys.is_empty() {
            builder = builder.with_values("index_keys", &self.index_keys);
        }
        if !self.referenced_by.is_empty() {
            builder = builder.with_values("referenced_by", &self.referenced_by);
        }
        builder.build()
    }
}

impl_no_output_node!(LogicalDelete, "Delete");

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalTruncate {
    pub schema: String,
    pub table: String,
    pub restart_identity: bool,
    pub cascade: bool,
    pub referenced_by: Vec<ReferencingTable>,
}

impl Explainable for LogicalTruncate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Truncate", conf)
            .with_value("table", format!("{}.{}", self.schema, self.table))
            .with_value_if_verbose("restart_identity", self.restart_identity)
            .with_value_if_verbose("cascade", self.cascade)
            .build()
    }
}

impl_no_output_node!(LogicalTruncate, "Truncate");
