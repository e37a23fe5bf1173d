pub mod compile;
pub mod session;
