//! Create and alter payloads shared by DDL plans and catalog mutations.
use quarry_ast::ast;

use super::entry::{ColumnEntry, ConstraintEntry, IndexKind};
use super::privilege::Privileges;
use crate::types::datatype::DataType;

/// Behavior on create conflict.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Ignore and return ok.
    ///
    /// CREATE IF NOT EXISTS
    Ignore,
    /// Replace the original entry.
    ///
    /// CREATE OR REPLACE
    Replace,
    /// Error on conflict.
    #[default]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSchemaInfo {
    pub name: String,
    pub owner: String,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableInfo {
    pub schema: String,
    pub name: String,
    /// Visible columns. The catalog adds the row id column.
    pub columns: Vec<ColumnEntry>,
    pub constraints: Vec<ConstraintEntry>,
    pub temp: bool,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewInfo {
    pub schema: String,
    pub name: String,
    pub query: ast::QueryNode,
    pub column_aliases: Option<Vec<String>>,
    /// Output columns of the view query, after aliasing.
    pub columns: Vec<ColumnEntry>,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTypeInfo {
    pub schema: String,
    pub name: String,
    pub datatype: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexInfo {
    pub schema: String,
    pub name: String,
    pub table: String,
    pub columns: Vec<usize>,
    pub kind: IndexKind,
    pub unique: bool,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSequenceInfo {
    pub schema: String,
    pub name: String,
    pub datatype: DataType,
    pub start: i64,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub cycle: bool,
    pub cache: i64,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateUserInfo {
    pub name: String,
    pub full_name: Option<String>,
    pub default_schema: String,
    pub default_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRoleInfo {
    pub name: String,
    pub admin: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableOp {
    AddColumn(ColumnEntry),
    DropColumn { column: usize, cascade: bool },
    SetDefault { column: usize, default: Option<ast::Expr> },
    SetNotNull { column: usize, not_null: bool },
    SetDataType { column: usize, datatype: DataType },
    AddConstraint(ConstraintEntry),
    DropConstraint { name: String, cascade: bool },
    RenameTable { to: String },
    RenameColumn { column: usize, to: String },
    SetSchema { to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableInfo {
    pub schema: String,
    pub name: String,
    pub op: AlterTableOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterSequenceInfo {
    pub schema: String,
    pub name: String,
    pub restart: Option<i64>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cycle: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterSchemaInfo {
    pub name: String,
    pub rename_to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterUserOp {
    SetPassword,
    SetSchema(String),
    SetDefaultRole(String),
    Rename(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterUserInfo {
    pub name: String,
    pub op: AlterUserOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropInfo {
    pub kind: super::entry::CatalogEntryKind,
    /// None for global objects (schemas, users, roles).
    pub schema: Option<String>,
    pub name: String,
    pub cascade: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrivilegeObject {
    Table {
        schema: String,
        table: String,
        /// Column level privileges.
        columns: Option<Vec<String>>,
    },
    Function {
        schema: String,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrantTarget {
    Privileges {
        privileges: Privileges,
        object: PrivilegeObject,
    },
    Roles(Vec<String>),
}

/// Shared by GRANT and REVOKE.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantInfo {
    pub target: GrantTarget,
    pub grantees: Vec<String>,
    /// WITH GRANT OPTION / WITH ADMIN OPTION, or GRANT OPTION FOR on revoke.
    pub grant_option: bool,
    pub grantor: String,
}
