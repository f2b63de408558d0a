//! Storage traits defining the interfaces the fact checker reads from

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tech_insights_core::{Check, Entity, EntityRef, Fact, FactSchemaDefinition};

use crate::StorageError;

/// Trait for fact and fact schema storage
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Store a schema version published by a fact retriever
    async fn insert_schema(&self, schema: FactSchemaDefinition) -> Result<(), StorageError>;

    /// Store fact rows, returning how many were inserted
    async fn insert_facts(&self, facts: Vec<Fact>) -> Result<usize, StorageError>;

    /// Latest fact row per retriever id for the entity. Ids without rows are omitted.
    async fn get_latest_facts_by_ids(
        &self,
        ids: &[String],
        entity: &EntityRef,
    ) -> Result<BTreeMap<String, Fact>, StorageError>;

    /// All fact rows per retriever id with `start <= timestamp <= end`, oldest first
    async fn get_facts_between_timestamps_by_ids(
        &self,
        ids: &[String],
        entity: &EntityRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeMap<String, Vec<Fact>>, StorageError>;

    /// Highest schema version per retriever id, for all ids when `ids` is `None`
    async fn get_latest_schemas(
        &self,
        ids: Option<&[String]>,
    ) -> Result<Vec<FactSchemaDefinition>, StorageError>;
}

/// Trait for the set of configured checks
#[async_trait]
pub trait CheckRegistry: Send + Sync {
    /// Get the checks with the given ids, failing on the first unknown id
    async fn get_all(&self, ids: &[String]) -> Result<Vec<Check>, StorageError>;

    /// List all checks in registration order
    async fn list(&self) -> Result<Vec<Check>, StorageError>;
}

/// Trait for catalog lookups
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Get an entity by reference
    async fn get_entity_by_ref(&self, entity: &EntityRef) -> Result<Option<Entity>, StorageError>;

    /// List every entity known to the catalog
    async fn list_entities(&self) -> Result<Vec<Entity>, StorageError>;
}
