use serde::{Deserialize, Serialize};

use super::{Expr, FunctionArg, Ident, ObjectReference, QueryNode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromNode {
    pub alias: Option<FromAlias>,
    pub body: FromNodeBody,
}

impl FromNode {
    pub fn table(name: &str) -> Self {
        FromNode {
            alias: None,
            body: FromNodeBody::BaseTable(FromBaseTable {
                reference: ObjectReference::from(name),
            }),
        }
    }

    pub fn subquery(query: QueryNode) -> Self {
        FromNode {
            alias: None,
            body: FromNodeBody::Subquery(FromSubquery {
                lateral: false,
                query,
            }),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(FromAlias {
            alias: Ident::new(alias),
            columns: None,
        });
        self
    }

    pub fn join(self, right: FromNode, join_type: JoinType, condition: JoinCondition) -> Self {
        FromNode {
            alias: None,
            body: FromNodeBody::Join(FromJoin {
                left: Box::new(self),
                right: Box::new(right),
                join_type,
                join_condition: condition,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromAlias {
    pub alias: Ident,
    pub columns: Option<Vec<Ident>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FromNodeBody {
    BaseTable(FromBaseTable),
    Subquery(FromSubquery),
    TableFunction(FromTableFunction),
    Join(FromJoin),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromBaseTable {
    pub reference: ObjectReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromSubquery {
    pub lateral: bool,
    pub query: QueryNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromTableFunction {
    pub lateral: bool,
    pub reference: ObjectReference,
    pub args: Vec<FunctionArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromJoin {
    pub left: Box<FromNode>,
    pub right: Box<FromNode>,
    pub join_type: JoinType,
    pub join_condition: JoinCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinCondition {
    On(Expr),
    Using(Vec<Ident>),
    Natural,
    None,
}
