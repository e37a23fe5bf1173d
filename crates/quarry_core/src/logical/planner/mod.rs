//! Turns bound queries into logical plans.
pub mod filter_pushdown;
pub mod plan_from;
pub mod plan_query;
pub mod plan_select;
pub mod plan_setop;
pub mod prune;
pub mod verify;
