pub mod alter;
pub use alter::*;
pub mod copy;
pub use copy::*;
pub mod create;
pub use create::*;
pub mod cte;
pub use cte::*;
pub mod datatype;
pub use datatype::*;
pub mod dml;
pub use dml::*;
pub mod drop;
pub use drop::*;
pub mod expr;
pub use expr::*;
pub mod from;
pub use from::*;
pub mod modifiers;
pub use modifiers::*;
pub mod privilege;
pub use privilege::*;
pub mod query;
pub use query::*;
pub mod select;
pub use select::*;
pub mod session;
pub use session::*;

use std::fmt;

use quarry_error::{DbError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    /// If the identifier was quoted. Quoted identifiers are case sensitive.
    pub quoted: bool,
}

impl Ident {
    pub fn new(s: impl Into<String>) -> Self {
        Ident {
            value: s.into(),
            quoted: false,
        }
    }

    pub fn quoted(s: impl Into<String>) -> Self {
        Ident {
            value: s.into(),
            quoted: true,
        }
    }

    /// Unquoted identifiers fold to lower case.
    pub fn as_normalized_string(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_lowercase()
        }
    }

    pub fn into_normalized_string(self) -> String {
        if self.quoted {
            self.value
        } else {
            self.value.to_lowercase()
        }
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// A possibly qualified object name, e.g. `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectReference(pub Vec<Ident>);

impl ObjectReference {
    /// Create an object from an iterator of strings.
    pub fn from_strings<S>(strings: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        ObjectReference(strings.into_iter().map(Ident::new).collect())
    }

    pub fn base(&self) -> Result<Ident> {
        match self.0.last() {
            Some(ident) => Ok(ident.clone()),
            None => Err(DbError::new("Empty object reference")),
        }
    }

    /// Split into an optional normalized schema and a normalized name.
    ///
    /// Errors if the reference has more than two parts.
    pub fn schema_and_name(&self) -> Result<(Option<String>, String)> {
        match self.0.as_slice() {
            [name] => Ok((None, name.as_normalized_string())),
            [schema, name] => Ok((
                Some(schema.as_normalized_string()),
                name.as_normalized_string(),
            )),
            [] => Err(DbError::new("Empty object reference")),
            _ => Err(DbError::invalid_input(format!(
                "Too many name parts in '{self}', expected at most 'schema.name'"
            ))),
        }
    }
}

impl From<&str> for ObjectReference {
    fn from(value: &str) -> Self {
        ObjectReference::from_strings(value.split('.'))
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strings: Vec<_> = self.0.iter().map(|ident| ident.to_string()).collect();
        write!(f, "{}", strings.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unquoted() {
        assert_eq!("abc", Ident::new("AbC").as_normalized_string());
        assert_eq!("AbC", Ident::quoted("AbC").as_normalized_string());
    }

    #[test]
    fn schema_and_name_split() {
        let (schema, name) = ObjectReference::from("S.T").schema_and_name().unwrap();
        assert_eq!(Some("s".to_string()), schema);
        assert_eq!("t", name);

        let (schema, _) = ObjectReference::from("t").schema_and_name().unwrap();
        assert_eq!(None, schema);

        ObjectReference::from("a.b.c").schema_and_name().unwrap_err();
    }
}
