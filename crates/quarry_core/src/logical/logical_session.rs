use std::fmt;

use quarry_error::Result;

use super::binder::bind_context::{BindContext, TableRef};
use super::operator::{LogicalNode, Node, impl_no_output_node};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::types::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOp {
    Start {
        isolation: Option<IsolationLevel>,
        read_only: bool,
    },
    Commit,
    Rollback {
        savepoint: Option<String>,
    },
    Savepoint(String),
    Release(String),
    SetCharacteristics {
        isolation: Option<IsolationLevel>,
        read_only: Option<bool>,
    },
}

impl fmt::Display for TransactionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { .. } => write!(f, "START"),
            Self::Commit => write!(f, "COMMIT"),
            Self::Rollback { savepoint: None } => write!(f, "ROLLBACK"),
            Self::Rollback {
                savepoint: Some(name),
            } => write!(f, "ROLLBACK TO {name}"),
            Self::Savepoint(name) => write!(f, "SAVEPOINT {name}"),
            Self::Release(name) => write!(f, "RELEASE {name}"),
            Self::SetCharacteristics { .. } => write!(f, "SET TRANSACTION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTransaction {
    pub op: TransactionOp,
}

impl Explainable for LogicalTransaction {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Transaction", conf)
            .with_value("op", &self.op)
            .build()
    }
}

impl_no_output_node!(LogicalTransaction, "Transaction");

/// A variable introduced by DECLARE.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredVariable {
    pub name: String,
    pub datatype: DataType,
    /// Already cast to `datatype`. A typed NULL when no default was given.
    pub initial: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDeclare {
    pub variables: Vec<DeclaredVariable>,
}

impl Explainable for LogicalDeclare {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Declare", conf)
            .with_values(
                "variables",
                self.variables
                    .iter()
                    .map(|v| format!("{} {}", v.name, v.datatype)),
            )
            .build()
    }
}

impl LogicalNode for Node<LogicalDeclare> {
    fn name(&self) -> &'static str {
        "Declare"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        Vec::new()
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for var in &self.node.variables {
            func(&var.initial)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for var in &mut self.node.variables {
            func(&mut var.initial)?;
        }
        Ok(())
    }
}

/// What a SET statement assigns to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetTarget {
    /// A global (session) variable.
    Global(String),
    /// A variable declared earlier with DECLARE.
    Local(String),
    /// A compiler setting such as `max_expression_depth`.
    Setting(String),
    Schema,
    Role,
}

impl fmt::Display for SetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global(name) => write!(f, "@@{name}"),
            Self::Local(name) => write!(f, "@{name}"),
            Self::Setting(name) => write!(f, "{name}"),
            Self::Schema => write!(f, "SCHEMA"),
            Self::Role => write!(f, "ROLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalSetVariable {
    pub target: SetTarget,
    /// Already cast to the variable's type.
    pub value: Expression,
}

impl Explainable for LogicalSetVariable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("SetVariable", conf)
            .with_value("target", &self.target)
            .with_contextual_value("value", &self.value)
            .build()
    }
}

impl LogicalNode for Node<LogicalSetVariable> {
    fn name(&self) -> &'static str {
        "SetVariable"
    }

    fn get_output_table_refs(&self, _bind_context: &BindContext) -> Vec<TableRef> {
        Vec::new()
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.value)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.value)
    }
}
