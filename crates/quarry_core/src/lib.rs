//! Semantic analysis and logical planning for SQL statements.
//!
//! Statements come in as syntax trees from `quarry_ast`, get resolved against
//! a [`catalog::Catalog`] and the session, and come out as a typed
//! [`logical::operator::LogicalOperator`] tree.
pub mod catalog;
pub mod compile;
pub mod config;
pub mod explain;
pub mod expr;
pub mod functions;
pub mod logical;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;
