use serde::{Deserialize, Serialize};

use super::{DropBehavior, Expr, FromNode, Ident, ObjectReference, QueryNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertSource {
    /// `VALUES (...)` or a query.
    Query(QueryNode),
    /// `DEFAULT VALUES`
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insert {
    pub table: ObjectReference,
    pub columns: Vec<Ident>,
    pub source: InsertSource,
}

impl Insert {
    pub fn values(table: &str, rows: Vec<Vec<Expr>>) -> Self {
        Insert {
            table: ObjectReference::from(table),
            columns: Vec::new(),
            source: InsertSource::Query(QueryNode::values(rows)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentValue {
    Expr(Expr),
    /// `SET c = DEFAULT`
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: Ident,
    pub value: AssignmentValue,
}

impl Assignment {
    pub fn new(column: &str, value: Expr) -> Self {
        Assignment {
            column: Ident::new(column),
            value: AssignmentValue::Expr(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub table: ObjectReference,
    pub alias: Option<Ident>,
    pub assignments: Vec<Assignment>,
    /// `UPDATE ... SET ... FROM <from>`
    pub from: Option<FromNode>,
    pub where_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delete {
    pub table: ObjectReference,
    pub alias: Option<Ident>,
    pub where_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeMatchedAction {
    Update(Vec<Assignment>),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeInsertValues {
    Values(Vec<Expr>),
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeClause {
    /// `WHEN MATCHED [AND <cond>] THEN UPDATE SET ... | DELETE`
    Matched {
        condition: Option<Expr>,
        action: MergeMatchedAction,
    },
    /// `WHEN NOT MATCHED [AND <cond>] THEN INSERT [(cols)] VALUES (...)`
    NotMatched {
        condition: Option<Expr>,
        columns: Vec<Ident>,
        values: MergeInsertValues,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merge {
    pub target: ObjectReference,
    pub target_alias: Option<Ident>,
    pub source: FromNode,
    pub on: Expr,
    pub clauses: Vec<MergeClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncate {
    pub table: ObjectReference,
    pub restart_identity: bool,
    pub behavior: DropBehavior,
}
