use serde::{Deserialize, Serialize};

use super::{DataType, Ident, IntervalQualifier, ObjectReference, OrderByNode, QueryNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Plus, e.g. `+9`
    Plus,
    /// Minus, e.g. `-9`
    Minus,
    /// Not, e.g. `NOT(true)`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Plus, e.g. `a + b`
    Plus,
    /// Minus, e.g. `a - b`
    Minus,
    /// Multiply, e.g. `a * b`
    Multiply,
    /// Divide, e.g. `a / b`
    Divide,
    /// Modulo, e.g. `a % b`
    Modulo,
    /// String concat, e.g. `a || b`
    StringConcat,
    /// Greater than, e.g. `a > b`
    Gt,
    /// Less than, e.g. `a < b`
    Lt,
    /// Greater equal, e.g. `a >= b`
    GtEq,
    /// Less equal, e.g. `a <= b`
    LtEq,
    /// Equal, e.g. `a = b`
    Eq,
    /// Not equal, e.g. `a <> b`
    NotEq,
    /// And, e.g. `a AND b`
    And,
    /// Or, e.g. `a OR b`
    Or,
    /// Bitwise or, e.g. `a | b`
    BitwiseOr,
    /// Bitwise and, e.g. `a & b`
    BitwiseAnd,
    /// Bitwise XOR, e.g. `a ^ b`
    BitwiseXor,
    /// Shift left, e.g. `a << b`
    ShiftLeft,
    /// Shift right, e.g. `a >> b`
    ShiftRight,
}

impl BinaryOperator {
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Lt | Self::GtEq | Self::LtEq | Self::Eq | Self::NotEq
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    /// Unparsed number literal.
    Number(String),
    /// String literal.
    SingleQuotedString(String),
    /// Blob literal, `X'0FAB'`.
    HexString(String),
    /// Boolean literal.
    Boolean(bool),
    /// Null literal
    Null,
    /// Typed string literal, e.g. `DATE '2024-01-01'`.
    Typed { datatype: DataType, value: String },
    /// `INTERVAL '3' DAY`
    Interval {
        value: String,
        qualifier: IntervalQualifier,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterRef {
    /// `?` (numbered in order of appearance by the parser) or `$1`.
    Positional(usize),
    /// `:name`
    Named(String),
}

/// Values available from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionValue {
    CurrentUser,
    CurrentRole,
    CurrentSchema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubqueryQuantifier {
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Column or variable identifier.
    Ident(Ident),
    /// Compound identifier.
    ///
    /// `table.col`, `schema.table.col`
    CompoundIdent(Vec<Ident>),
    /// An expression literal,
    Literal(Literal),
    /// A prepared statement parameter.
    Parameter(ParameterRef),
    /// `CURRENT_USER` and friends.
    SessionValue(SessionValue),
    /// Row constructor, `(a, b)`
    Tuple(Vec<Expr>),
    /// Parenthesized expression.
    Nested(Box<Expr>),
    UnaryExpr {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    BinaryExpr {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Function(Box<Function>),
    /// `CASE [expr] WHEN ... THEN ... ELSE ... END`
    Case {
        expr: Option<Box<Expr>>,
        conditions: Vec<Expr>,
        results: Vec<Expr>,
        else_expr: Option<Box<Expr>>,
    },
    Cast {
        datatype: DataType,
        expr: Box<Expr>,
        /// TRY_CAST produces NULL instead of erroring.
        try_cast: bool,
    },
    /// `<expr> [NOT] IN (<list>)`
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `<expr> [NOT] IN (<subquery>)`
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<QueryNode>,
        negated: bool,
    },
    /// `<expr> <op> ANY|ALL (<subquery>)`
    QuantifiedSubquery {
        left: Box<Expr>,
        op: BinaryOperator,
        quantifier: SubqueryQuantifier,
        subquery: Box<QueryNode>,
    },
    /// `[NOT] EXISTS (<subquery>)`
    Exists {
        subquery: Box<QueryNode>,
        not_exists: bool,
    },
    /// Scalar subquery.
    Subquery(Box<QueryNode>),
    /// `<expr> [NOT] BETWEEN [SYMMETRIC] <low> AND <high>`
    Between {
        expr: Box<Expr>,
        negated: bool,
        symmetric: bool,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// `<expr> [NOT] [I]LIKE <pattern> [ESCAPE <escape>]`
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
        case_insensitive: bool,
    },
    /// `<expr> IS [NOT] NULL`
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// `<expr> IS [NOT] TRUE|FALSE`
    IsBool {
        expr: Box<Expr>,
        val: bool,
        negated: bool,
    },
    /// `<left> IS [NOT] DISTINCT FROM <right>`
    IsDistinctFrom {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },
    /// `NEXT VALUE FOR <sequence>`
    NextValueFor(ObjectReference),
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(Ident::new(name))
    }

    /// `a.b[.c]`
    pub fn compound(parts: &[&str]) -> Self {
        Expr::CompoundIdent(parts.iter().map(|p| Ident::new(*p)).collect())
    }

    pub fn number(n: impl ToString) -> Self {
        Expr::Literal(Literal::Number(n.to_string()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::SingleQuotedString(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Expr::Literal(Literal::Boolean(b))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOperator::Eq, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOperator::And, right)
    }

    pub fn not(expr: Expr) -> Self {
        Expr::UnaryExpr {
            op: UnaryOperator::Not,
            expr: Box::new(expr),
        }
    }

    /// A plain function call, `name(args...)`.
    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function(Box::new(Function::new(name, args)))
    }

    /// `COUNT(*)`
    pub fn count_star() -> Self {
        Expr::Function(Box::new(Function {
            reference: ObjectReference::from("count"),
            args: vec![FunctionArg::Unnamed {
                arg: FunctionArgExpr::Wildcard,
            }],
            distinct: false,
            filter: None,
            over: None,
        }))
    }

    pub fn subquery(query: QueryNode) -> Self {
        Expr::Subquery(Box::new(query))
    }

    pub fn exists(query: QueryNode) -> Self {
        Expr::Exists {
            subquery: Box::new(query),
            not_exists: false,
        }
    }

    pub fn in_list(expr: Expr, list: Vec<Expr>, negated: bool) -> Self {
        Expr::InList {
            expr: Box::new(expr),
            list,
            negated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionArgExpr {
    Expr(Expr),
    /// `*`, only valid for `COUNT(*)`.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionArg {
    /// A named argument. Allows use of either `=>` or `=` for assignment.
    ///
    /// `ident => <expr>` or `ident = <expr>`
    Named { name: Ident, arg: FunctionArgExpr },
    Unnamed { arg: FunctionArgExpr },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    pub reference: ObjectReference,
    pub args: Vec<FunctionArg>,
    /// `DISTINCT` inside an aggregate call.
    pub distinct: bool,
    /// `FILTER (WHERE ...)`
    pub filter: Option<Box<Expr>>,
    /// `OVER (...)`
    pub over: Option<WindowSpec>,
}

impl Function {
    pub fn new(name: &str, args: Vec<Expr>) -> Self {
        Function {
            reference: ObjectReference::from(name),
            args: args
                .into_iter()
                .map(|arg| FunctionArg::Unnamed {
                    arg: FunctionArgExpr::Expr(arg),
                })
                .collect(),
            distinct: false,
            filter: None,
            over: None,
        }
    }

    pub fn with_over(mut self, over: WindowDefinition) -> Self {
        self.over = Some(WindowSpec::Definition(over));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowSpec {
    /// `OVER w`, references a window in the WINDOW clause.
    Named(Ident),
    Definition(WindowDefinition),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowDefinition {
    /// `OVER (w ORDER BY ...)`, extends an existing window.
    pub existing: Option<Ident>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByNode>,
    pub frame: Option<WindowFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowFrameUnit {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowFrameBound {
    CurrentRow,
    UnboundedPreceding,
    Preceding(Box<Expr>),
    UnboundedFollowing,
    Following(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowFrameExclusion {
    CurrentRow,
    Group,
    Ties,
    NoOthers,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowFrame {
    pub unit: WindowFrameUnit,
    pub start: WindowFrameBound,
    /// `BETWEEN start AND end`. A frame written with only a start bound ends
    /// at the current row.
    pub end: Option<WindowFrameBound>,
    pub exclusion: Option<WindowFrameExclusion>,
}
