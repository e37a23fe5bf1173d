pub mod bind_context;
pub mod bind_ddl;
pub mod bind_dml;
pub mod bind_literal;
pub mod bind_query;
pub mod bind_session;
pub mod bind_statement;
pub mod bind_window;
pub mod column_binder;
pub mod expr_binder;
pub mod scope_stack;
