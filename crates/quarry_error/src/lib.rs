use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Coarse classification of a compilation failure.
///
/// Callers match on the kind, the message is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Schema, table, column, function, sequence, role (etc) is unknown.
    NotFound,
    /// Duplicate name.
    AlreadyExists,
    /// Name resolves to more than one relation or column.
    AmbiguousReference,
    /// No common type, or a cast is impossible.
    TypeMismatch,
    PrivilegeDenied,
    /// Ungrouped column outside an aggregate, or a misplaced/nested aggregate.
    GroupByViolation,
    /// Column count mismatch (INSERT, set operations, CTE column lists).
    ArityMismatch,
    /// More rows than the context allows.
    CardinalityViolation,
    /// Recognized but intentionally unimplemented SQL feature.
    UnsupportedConstruct,
    /// Nesting or expansion limits exceeded.
    ResourceExhausted,
    /// Semantically invalid input that doesn't fit any other kind.
    InvalidInput,
    /// Bug in the planner.
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::AmbiguousReference => "AmbiguousReference",
            Self::TypeMismatch => "TypeMismatch",
            Self::PrivilegeDenied => "PrivilegeDenied",
            Self::GroupByViolation => "GroupByViolation",
            Self::ArityMismatch => "ArityMismatch",
            Self::CardinalityViolation => "CardinalityViolation",
            Self::UnsupportedConstruct => "UnsupportedConstruct",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::InvalidInput => "InvalidInput",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    kind: ErrorKind,
    msg: String,
    fields: Vec<ErrorField>,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorField {
    pub key: Cow<'static, str>,
    pub value: String,
}

macro_rules! kind_constructor {
    ($fn_name:ident, $kind:ident) => {
        pub fn $fn_name(msg: impl Into<String>) -> Self {
            Self::with_kind(ErrorKind::$kind, msg)
        }
    };
}

impl DbError {
    /// Create a new internal error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                kind,
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    kind_constructor!(not_found, NotFound);
    kind_constructor!(already_exists, AlreadyExists);
    kind_constructor!(ambiguous, AmbiguousReference);
    kind_constructor!(type_mismatch, TypeMismatch);
    kind_constructor!(privilege_denied, PrivilegeDenied);
    kind_constructor!(group_by_violation, GroupByViolation);
    kind_constructor!(arity_mismatch, ArityMismatch);
    kind_constructor!(cardinality_violation, CardinalityViolation);
    kind_constructor!(unsupported, UnsupportedConstruct);
    kind_constructor!(resource_exhausted, ResourceExhausted);
    kind_constructor!(invalid_input, InvalidInput);

    /// Attach a key/value pair describing the offending identifier(s).
    pub fn with_field(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.inner.fields.push(ErrorField {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_source(mut self, source: Box<dyn Error + Send + Sync>) -> Self {
        self.inner.source = Some(source);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    pub fn fields(&self) -> &[ErrorField] {
        &self.inner.fields
    }

    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.kind, self.inner.msg)?;

        for field in &self.inner.fields {
            write!(f, "\n  {}: {}", field.key, field.value)?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace: {}", self.inner.backtrace)?
        }

        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<fmt::Error> for DbError {
    fn from(value: fmt::Error) -> Self {
        DbError::new("Format error").with_source(Box::new(value))
    }
}

/// Returns an `UnsupportedConstruct` error for a recognized feature that is
/// not implemented.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {{
        let msg = format!($($arg)+);
        return Err($crate::DbError::unsupported(format!("Not yet implemented: {msg}")));
    }};
}

pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T, DbError>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T, DbError>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T, DbError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::new(msg).with_source(Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T, DbError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::new(f()).with_source(Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an internal error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(DbError::new(format!("Missing required value: {msg}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_fields() {
        let err = DbError::not_found("Missing table").with_field("table", "t1");
        let s = err.to_string();
        assert!(s.starts_with("NotFound: Missing table"), "{s}");
        assert!(s.contains("table: t1"), "{s}");
        assert_eq!(Some("t1"), err.get_field("table"));
    }

    #[test]
    fn not_implemented_is_unsupported() {
        fn f() -> Result<()> {
            not_implemented!("recursive CTEs")
        }
        let err = f().unwrap_err();
        assert_eq!(ErrorKind::UnsupportedConstruct, err.kind());
    }

    #[test]
    fn option_required_is_internal() {
        let err = None::<i32>.required("schema").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }
}
