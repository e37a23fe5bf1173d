use serde::{Deserialize, Serialize};

use super::{CommonTableExprs, Expr, Ident, LimitModifier, OrderByNode, SelectNode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryNode {
    pub ctes: Option<CommonTableExprs>,
    pub body: QueryNodeBody,
    pub order_by: Vec<OrderByNode>,
    pub limit: LimitModifier,
}

impl QueryNode {
    pub fn select(select: SelectNode) -> Self {
        QueryNode {
            ctes: None,
            body: QueryNodeBody::Select(Box::new(select)),
            order_by: Vec::new(),
            limit: LimitModifier::default(),
        }
    }

    pub fn values(rows: Vec<Vec<Expr>>) -> Self {
        QueryNode {
            ctes: None,
            body: QueryNodeBody::Values(Values { rows }),
            order_by: Vec::new(),
            limit: LimitModifier::default(),
        }
    }

    pub fn set_op(left: QueryNode, operation: SetOperation, all: bool, right: QueryNode) -> Self {
        QueryNode {
            ctes: None,
            body: QueryNodeBody::Set {
                left: Box::new(left.body),
                right: Box::new(right.body),
                operation,
                all,
                corresponding: None,
            },
            order_by: Vec::new(),
            limit: LimitModifier::default(),
        }
    }

    pub fn with_ctes(mut self, ctes: CommonTableExprs) -> Self {
        self.ctes = Some(ctes);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderByNode>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: Expr) -> Self {
        self.limit.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryNodeBody {
    Select(Box<SelectNode>),
    Nested(Box<QueryNode>),
    Set {
        left: Box<QueryNodeBody>,
        right: Box<QueryNodeBody>,
        operation: SetOperation,
        all: bool,
        corresponding: Option<Corresponding>,
    },
    Values(Values),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperation {
    Union,
    Except,
    Intersect,
}

/// `CORRESPONDING [BY (col, ...)]`
///
/// An empty column list pairs every column name common to both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Corresponding {
    pub columns: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Values {
    pub rows: Vec<Vec<Expr>>,
}
