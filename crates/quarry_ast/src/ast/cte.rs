use serde::{Deserialize, Serialize};

use super::{Ident, QueryNode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommonTableExprs {
    pub recursive: bool,
    pub ctes: Vec<CommonTableExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommonTableExpr {
    pub alias: Ident,
    pub column_aliases: Option<Vec<Ident>>,
    pub materialized: bool,
    pub body: Box<QueryNode>,
}

impl CommonTableExpr {
    pub fn new(alias: &str, body: QueryNode) -> Self {
        CommonTableExpr {
            alias: Ident::new(alias),
            column_aliases: None,
            materialized: false,
            body: Box::new(body),
        }
    }
}
