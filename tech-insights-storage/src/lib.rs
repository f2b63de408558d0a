//! Storage layer for Tech Insights
//!
//! Read interfaces for facts, fact schemas, checks and catalog entities,
//! with in-memory implementations used by the server and in tests.

pub mod error;
pub mod memory;
pub mod seed;
pub mod traits;

pub use error::StorageError;
pub use memory::{InMemoryCatalog, InMemoryCheckRegistry, InMemoryFactStore};
pub use seed::SeedData;
pub use traits::{CheckRegistry, EntityCatalog, FactStore};
