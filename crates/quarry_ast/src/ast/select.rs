use serde::{Deserialize, Serialize};

use super::{Expr, FromNode, Ident, ObjectReference, WindowDefinition};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectNode {
    pub distinct: bool,
    pub projections: Vec<SelectExpr>,
    pub from: Option<FromNode>,
    pub where_expr: Option<Expr>,
    pub group_by: Option<GroupByNode>,
    pub having: Option<Expr>,
    /// `WINDOW w AS (...)`
    pub windows: Vec<NamedWindow>,
}

impl SelectNode {
    pub fn new(projections: Vec<SelectExpr>) -> Self {
        SelectNode {
            projections,
            ..Default::default()
        }
    }

    pub fn from(mut self, from: FromNode) -> Self {
        self.from = Some(from);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_expr = Some(expr);
        self
    }

    pub fn group_by(mut self, exprs: Vec<GroupByExpr>) -> Self {
        self.group_by = Some(GroupByNode::Exprs { exprs });
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectExpr {
    /// An unaliased expression.
    Expr(Expr),
    /// An aliased expression, `<expr> AS <alias>`
    AliasedExpr(Expr, Ident),
    /// `<table>.*`
    QualifiedWildcard(ObjectReference),
    /// `*`
    Wildcard,
}

impl SelectExpr {
    pub fn get_alias(&self) -> Option<&Ident> {
        match self {
            Self::AliasedExpr(_, alias) => Some(alias),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupByNode {
    /// `GROUP BY ALL`, every non-aggregate projection.
    All,
    Exprs { exprs: Vec<GroupByExpr> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupByExpr {
    /// `GROUP BY <expr>`
    Expr(Expr),
    /// `GROUP BY CUBE (<expr>, ...)`
    Cube(Vec<Expr>),
    /// `GROUP BY ROLLUP (<expr>, ...)`
    Rollup(Vec<Expr>),
    /// `GROUP BY GROUPING SETS ((<expr>, ...), ...)`
    GroupingSets(Vec<Vec<Expr>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedWindow {
    pub name: Ident,
    pub definition: WindowDefinition,
}
