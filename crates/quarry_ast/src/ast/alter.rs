use serde::{Deserialize, Serialize};

use super::{ColumnDef, DataType, DropBehavior, Expr, Ident, ObjectReference, TableConstraint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTable {
    pub if_exists: bool,
    pub name: ObjectReference,
    pub operation: AlterTableOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterTableOperation {
    AddColumn {
        if_not_exists: bool,
        column: ColumnDef,
    },
    DropColumn {
        name: Ident,
        if_exists: bool,
        behavior: DropBehavior,
    },
    AlterColumn {
        name: Ident,
        operation: AlterColumnOperation,
    },
    AddConstraint(TableConstraint),
    DropConstraint {
        name: Ident,
        behavior: DropBehavior,
    },
    RenameTable {
        to: Ident,
    },
    RenameColumn {
        from: Ident,
        to: Ident,
    },
    SetSchema(Ident),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterColumnOperation {
    SetDefault(Expr),
    DropDefault,
    SetNotNull,
    DropNotNull,
    SetDataType(DataType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterSequence {
    pub name: ObjectReference,
    /// `RESTART [WITH n]`
    pub restart: Option<Option<i64>>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cycle: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterSchema {
    pub if_exists: bool,
    pub name: Ident,
    pub rename_to: Ident,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterUserOperation {
    SetPassword {
        password: String,
        old_password: Option<String>,
    },
    SetSchema(Ident),
    SetDefaultRole(Ident),
    Rename(Ident),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterUser {
    pub name: Ident,
    pub operation: AlterUserOperation,
}
