//! In-memory storage implementation for development and testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tech_insights_core::{Check, Entity, EntityRef, Fact, FactSchemaDefinition};

use crate::{CheckRegistry, EntityCatalog, FactStore, StorageError};

/// In-memory fact store keyed by retriever id
pub struct InMemoryFactStore {
    schemas: RwLock<BTreeMap<String, Vec<FactSchemaDefinition>>>,
    facts: RwLock<BTreeMap<String, Vec<Fact>>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(BTreeMap::new()),
            facts: RwLock::new(BTreeMap::new()),
        }
    }

    fn rows_for<'a>(
        rows: &'a BTreeMap<String, Vec<Fact>>,
        id: &str,
        entity: &'a EntityRef,
    ) -> impl Iterator<Item = &'a Fact> + 'a {
        rows.get(id)
            .into_iter()
            .flatten()
            .filter(move |fact| &fact.entity == entity)
    }
}

impl Default for InMemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn insert_schema(&self, schema: FactSchemaDefinition) -> Result<(), StorageError> {
        let mut schemas = self.schemas.write();
        let versions = schemas.entry(schema.id.clone()).or_default();

        if versions.iter().any(|s| s.version == schema.version) {
            return Err(StorageError::AlreadyExists(format!(
                "Fact schema {} version {}",
                schema.id, schema.version
            )));
        }

        tracing::debug!("Registered fact schema {} version {}", schema.id, schema.version);
        versions.push(schema);
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(())
    }

    async fn insert_facts(&self, facts: Vec<Fact>) -> Result<usize, StorageError> {
        {
            let schemas = self.schemas.read();
            if let Some(unknown) = facts.iter().find(|f| !schemas.contains_key(&f.id)) {
                return Err(StorageError::NotFound(format!(
                    "No schema registered for fact retriever {}",
                    unknown.id
                )));
            }
        }

        let count = facts.len();
        let mut rows = self.facts.write();
        for fact in facts {
            rows.entry(fact.id.clone()).or_default().push(fact);
        }
        Ok(count)
    }

    async fn get_latest_facts_by_ids(
        &self,
        ids: &[String],
        entity: &EntityRef,
    ) -> Result<BTreeMap<String, Fact>, StorageError> {
        let rows = self.facts.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                Self::rows_for(&rows, id, entity)
                    .max_by_key(|fact| fact.timestamp)
                    .map(|fact| (id.clone(), fact.clone()))
            })
            .collect())
    }

    async fn get_facts_between_timestamps_by_ids(
        &self,
        ids: &[String],
        entity: &EntityRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeMap<String, Vec<Fact>>, StorageError> {
        let rows = self.facts.read();
        let mut result = BTreeMap::new();
        for id in ids {
            let mut in_range: Vec<Fact> = Self::rows_for(&rows, id, entity)
                .filter(|fact| fact.timestamp >= start && fact.timestamp <= end)
                .cloned()
                .collect();
            if in_range.is_empty() {
                continue;
            }
            in_range.sort_by_key(|fact| fact.timestamp);
            result.insert(id.clone(), in_range);
        }
        Ok(result)
    }

    async fn get_latest_schemas(
        &self,
        ids: Option<&[String]>,
    ) -> Result<Vec<FactSchemaDefinition>, StorageError> {
        let schemas = self.schemas.read();
        let latest = |versions: &Vec<FactSchemaDefinition>| versions.last().cloned();

        Ok(match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| schemas.get(id).and_then(latest))
                .collect(),
            None => schemas.values().filter_map(latest).collect(),
        })
    }
}

/// Check registry holding checks in registration order
pub struct InMemoryCheckRegistry {
    checks: RwLock<Vec<Check>>,
}

impl InMemoryCheckRegistry {
    pub fn new() -> Self {
        Self {
            checks: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry from a list of checks, rejecting duplicate ids
    pub fn with_checks(checks: Vec<Check>) -> Result<Self, StorageError> {
        let registry = Self::new();
        {
            let mut stored = registry.checks.write();
            for check in checks {
                if stored.iter().any(|c| c.id == check.id) {
                    return Err(StorageError::AlreadyExists(format!(
                        "Check with id {}",
                        check.id
                    )));
                }
                stored.push(check);
            }
        }
        Ok(registry)
    }
}

impl Default for InMemoryCheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckRegistry for InMemoryCheckRegistry {
    async fn get_all(&self, ids: &[String]) -> Result<Vec<Check>, StorageError> {
        let checks = self.checks.read();
        ids.iter()
            .map(|id| {
                checks.iter().find(|c| &c.id == id).cloned().ok_or_else(|| {
                    StorageError::NotFound(format!("Check with id {} not found", id))
                })
            })
            .collect()
    }

    async fn list(&self) -> Result<Vec<Check>, StorageError> {
        Ok(self.checks.read().clone())
    }
}

/// Catalog of entities keyed by canonical entity ref
pub struct InMemoryCatalog {
    entities: RwLock<BTreeMap<String, Entity>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let catalog = Self::new();
        for entity in entities {
            catalog.add_entity(entity);
        }
        catalog
    }

    /// Add or replace an entity
    pub fn add_entity(&self, entity: Entity) {
        let key = entity.entity_ref().canonical();
        self.entities.write().insert(key, entity);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityCatalog for InMemoryCatalog {
    async fn get_entity_by_ref(&self, entity: &EntityRef) -> Result<Option<Entity>, StorageError> {
        Ok(self.entities.read().get(&entity.canonical()).cloned())
    }

    async fn list_entities(&self) -> Result<Vec<Entity>, StorageError> {
        Ok(self.entities.read().values().cloned().collect())
    }
}
