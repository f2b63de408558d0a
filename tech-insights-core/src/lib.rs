//! Core domain models for Tech Insights
//!
//! This crate contains the shared data structures used across
//! the fact checker: Check, Condition, Fact, FactSchema, Entity and CheckResult.

pub mod entity;
pub mod error;
pub mod facts;
pub mod models;
pub mod path;

pub use entity::{Entity, EntityMeta, EntityRef, DEFAULT_NAMESPACE};
pub use error::CoreError;
pub use facts::*;
pub use models::*;
