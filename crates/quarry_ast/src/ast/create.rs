use serde::{Deserialize, Serialize};

use super::{DataType, Expr, Ident, ObjectReference, QueryNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSchema {
    pub if_not_exists: bool,
    pub name: Ident,
    /// `AUTHORIZATION <role>`
    pub authorization: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    pub or_replace: bool,
    pub if_not_exists: bool,
    pub temp: bool,
    pub name: ObjectReference,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    /// `CREATE TABLE ... AS <query>`
    pub source: Option<QueryNode>,
    /// `WITH [NO] DATA` for CREATE TABLE AS.
    pub with_data: bool,
}

impl CreateTable {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        CreateTable {
            or_replace: false,
            if_not_exists: false,
            temp: false,
            name: ObjectReference::from(name),
            columns,
            constraints: Vec::new(),
            source: None,
            with_data: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: Ident,
    pub datatype: DataType,
    pub options: Vec<ColumnOption>,
}

impl ColumnDef {
    pub fn new(name: &str, datatype: DataType) -> Self {
        ColumnDef {
            name: Ident::new(name),
            datatype,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: ColumnOption) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnOption {
    Null,
    NotNull,
    Default(Expr),
    PrimaryKey,
    Unique,
    References {
        table: ObjectReference,
        columns: Vec<Ident>,
    },
    Check(Expr),
    /// Shorthand for a default pulling from an implicit sequence.
    AutoIncrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<Ident>),
    Unique(Vec<Ident>),
    ForeignKey {
        columns: Vec<Ident>,
        foreign_table: ObjectReference,
        /// Empty to reference the primary key.
        referred_columns: Vec<Ident>,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
    Check(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraint {
    pub name: Option<Ident>,
    pub kind: TableConstraintKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateView {
    pub or_replace: bool,
    pub name: ObjectReference,
    pub columns: Option<Vec<Ident>>,
    pub query: QueryNode,
    pub with_check_option: bool,
}

/// `CREATE TYPE <name> AS <datatype>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateType {
    pub name: ObjectReference,
    pub datatype: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexKind {
    /// Plain `CREATE [UNIQUE] INDEX`, hash based.
    #[default]
    Hash,
    /// `CREATE ORDERED INDEX`
    Ordered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub if_not_exists: bool,
    pub name: Ident,
    pub table: ObjectReference,
    pub columns: Vec<Ident>,
    pub kind: IndexKind,
    pub unique: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOptions {
    pub datatype: Option<DataType>,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cycle: Option<bool>,
    pub cache: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSequence {
    pub if_not_exists: bool,
    pub name: ObjectReference,
    pub options: SequenceOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: Ident,
    pub password: String,
    /// Password is already hashed.
    pub encrypted: bool,
    pub full_name: String,
    pub default_schema: Option<Ident>,
    pub default_role: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: Ident,
    /// `WITH ADMIN <grantor>`
    pub admin: Option<Ident>,
}
