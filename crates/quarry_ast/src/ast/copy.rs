use serde::{Deserialize, Serialize};

use super::{Expr, Ident, ObjectReference, QueryNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    /// Field delimiter, defaults to '|'.
    pub delimiter: Option<String>,
    /// Record delimiter, defaults to '\n'.
    pub record_delimiter: Option<String>,
    pub quote: Option<String>,
    /// `NULL AS '<string>'`
    pub null_string: Option<String>,
    pub header: bool,
    /// `OFFSET n`, rows to skip.
    pub offset: Option<Expr>,
    /// `n RECORDS`
    pub record_count: Option<Expr>,
    /// `BEST EFFORT`, skip rows that fail to load.
    pub best_effort: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopySource {
    Files(Vec<String>),
    Stdin,
}

/// `COPY INTO <table> FROM <source>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFrom {
    pub table: ObjectReference,
    pub columns: Vec<Ident>,
    pub source: CopySource,
    /// Loader function to use, e.g. `csv`. Defaults to the delimited text
    /// loader.
    pub loader: Option<ObjectReference>,
    pub options: CopyOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyToSource {
    Query(QueryNode),
    Table(ObjectReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyTarget {
    File(String),
    Stdout,
}

/// `COPY <query> INTO <target>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyTo {
    pub source: CopyToSource,
    pub target: CopyTarget,
    pub options: CopyOptions,
}
