use serde::{Deserialize, Serialize};

use super::{DataType, Expr, Ident, ObjectReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatement {
    Start {
        isolation: Option<IsolationLevel>,
        read_only: bool,
    },
    Commit,
    Rollback {
        savepoint: Option<Ident>,
    },
    Savepoint(Ident),
    Release(Ident),
    SetTransaction {
        isolation: Option<IsolationLevel>,
        read_only: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: Ident,
    pub datatype: DataType,
    pub default: Option<Expr>,
}

/// `DECLARE a INT, b VARCHAR(10)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declare {
    pub variables: Vec<VariableDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetStatement {
    /// `SET [schema.]var = <expr>`
    Variable {
        reference: ObjectReference,
        value: Expr,
    },
    /// `SET SCHEMA <name>`
    Schema(Ident),
    /// `SET ROLE <name>`
    Role(Ident),
}

/// `CALL [schema.]proc(args...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub reference: ObjectReference,
    pub args: Vec<Expr>,
}
