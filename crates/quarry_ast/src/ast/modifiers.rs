use serde::{Deserialize, Serialize};

use super::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderByType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderByNulls {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderByNode {
    pub typ: Option<OrderByType>,
    pub nulls: Option<OrderByNulls>,
    pub expr: Expr,
}

impl OrderByNode {
    pub fn asc(expr: Expr) -> Self {
        OrderByNode {
            typ: None,
            nulls: None,
            expr,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        OrderByNode {
            typ: Some(OrderByType::Desc),
            nulls: None,
            expr,
        }
    }
}

/// `LIMIT`, `OFFSET`, `SAMPLE` and `SEED` trailing a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitModifier {
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub sample: Option<Expr>,
    pub seed: Option<Expr>,
}

impl LimitModifier {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none() && self.sample.is_none() && self.seed.is_none()
    }
}
