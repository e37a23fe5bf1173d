//! Syntax tree for SQL statements.
//!
//! Only the node types live here. Producing these trees from text is the job
//! of a parser outside of this workspace. Constructors on the node types exist
//! so that trees can be assembled by hand (tests, embedders generating SQL).
pub mod ast;
pub mod statement;
