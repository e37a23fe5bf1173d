//! Human readable (and JSON) renderings of logical plans.
pub mod context_display;
pub mod explainable;
pub mod node;
