//! Fact checking engine
//!
//! Evaluates check condition trees against the latest facts of an entity,
//! gates checks with entity filters, and runs checks across many entities
//! with bounded concurrency.

pub mod bulk;
pub mod condition;
pub mod error;
pub mod fact_checker;
pub mod filter;
pub mod operators;

pub use bulk::run_bulk;
pub use error::EngineError;
pub use fact_checker::{FactChecker, FactCheckerBuilder};
pub use operators::{FnOperator, Operator, OperatorRegistry};
