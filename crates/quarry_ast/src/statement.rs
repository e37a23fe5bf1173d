use serde::{Deserialize, Serialize};

use crate::ast::{
    AlterSchema, AlterSequence, AlterTable, AlterUser, Call, CopyFrom, CopyTo, CreateIndex,
    CreateRole, CreateSchema, CreateSequence, CreateTable, CreateType, CreateUser, CreateView,
    Declare, Delete, DropStatement, Grant, Insert, Merge, QueryNode, Revoke, SetStatement,
    TransactionStatement, Truncate, Update,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Query(QueryNode),

    /// CREATE SCHEMA ...
    CreateSchema(CreateSchema),
    /// CREATE TABLE ...
    CreateTable(CreateTable),
    /// CREATE VIEW ...
    CreateView(CreateView),
    CreateType(CreateType),
    CreateIndex(CreateIndex),
    CreateSequence(CreateSequence),
    CreateUser(CreateUser),
    CreateRole(CreateRole),

    AlterTable(AlterTable),
    AlterSequence(AlterSequence),
    AlterSchema(AlterSchema),
    AlterUser(AlterUser),

    Drop(DropStatement),

    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Merge(Merge),
    Truncate(Truncate),

    CopyFrom(CopyFrom),
    CopyTo(CopyTo),

    Grant(Grant),
    Revoke(Revoke),

    Transaction(TransactionStatement),
    Declare(Declare),
    /// SET <variable> = <value>, SET SCHEMA, SET ROLE
    Set(SetStatement),
    Call(Call),

    /// EXPLAIN [ANALYZE] [VERBOSE] <statement>
    Explain {
        analyze: bool,
        verbose: bool,
        format: ExplainFormat,
        body: Box<Statement>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExplainFormat {
    #[default]
    Text,
    Json,
}

impl Statement {
    pub fn explain(body: Statement) -> Self {
        Statement::Explain {
            analyze: false,
            verbose: false,
            format: ExplainFormat::Text,
            body: Box::new(body),
        }
    }
}
