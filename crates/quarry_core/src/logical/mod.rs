//! Logical plans and the binder/planner producing them.
pub mod binder;
pub mod logical_aggregate;
pub mod logical_call;
pub mod logical_copy;
pub mod logical_ddl;
pub mod logical_distinct;
pub mod logical_dml;
pub mod logical_empty;
pub mod logical_explain;
pub mod logical_expression_list;
pub mod logical_filter;
pub mod logical_guard;
pub mod logical_join;
pub mod logical_limit;
pub mod logical_order;
pub mod logical_project;
pub mod logical_scan;
pub mod logical_session;
pub mod logical_setop;
pub mod logical_table_function;
pub mod logical_window;
pub mod operator;
pub mod planner;
