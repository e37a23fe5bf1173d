use indexmap::IndexMap;
use quarry_error::{DbError, Result};

use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Who is compiling, and where unqualified names resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user: String,
    pub role: String,
    /// Current schema.
    pub schema: String,
    pub autocommit: bool,
}

impl SessionIdentity {
    pub fn new(user: impl Into<String>, role: impl Into<String>, schema: impl Into<String>) -> Self {
        SessionIdentity {
            user: user.into(),
            role: role.into(),
            schema: schema.into(),
            autocommit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub datatype: DataType,
    pub value: ScalarValue,
}

/// Session variables persisting across statements.
///
/// Visible to every statement as the bottom frame of the scope stack. The
/// compiler only reads these, SET statements produce a plan that the caller
/// applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalVariables {
    variables: IndexMap<String, GlobalVariable>,
}

impl GlobalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new variable. Errors if it already exists.
    pub fn declare(&mut self, name: impl Into<String>, datatype: DataType, value: ScalarValue) -> Result<()> {
        let name = name.into();
        if self.variables.contains_key(&name) {
            return Err(DbError::already_exists(format!(
                "Variable '{name}' already declared"
            ))
            .with_field("name", name));
        }
        self.variables
            .insert(name, GlobalVariable { datatype, value });
        Ok(())
    }

    /// Set the value of an existing variable.
    pub fn set(&mut self, name: &str, value: ScalarValue) -> Result<()> {
        let var = self.variables.get_mut(name).ok_or_else(|| {
            DbError::not_found(format!("Missing variable '{name}'")).with_field("name", name)
        })?;
        var.value = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&GlobalVariable> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GlobalVariable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_set() {
        let mut globals = GlobalVariables::new();
        globals
            .declare("debug", DataType::Boolean, ScalarValue::Boolean(false))
            .unwrap();
        globals.set("debug", ScalarValue::Boolean(true)).unwrap();
        assert_eq!(
            ScalarValue::Boolean(true),
            globals.get("debug").unwrap().value
        );
    }

    #[test]
    fn declare_duplicate() {
        let mut globals = GlobalVariables::new();
        globals
            .declare("a", DataType::Int32, ScalarValue::Int32(1))
            .unwrap();
        let err = globals
            .declare("a", DataType::Int32, ScalarValue::Int32(2))
            .unwrap_err();
        assert_eq!(quarry_error::ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn set_missing() {
        let mut globals = GlobalVariables::new();
        globals.set("b", ScalarValue::Int32(1)).unwrap_err();
    }
}
