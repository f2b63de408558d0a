//! Seed data loaded into the in-memory stores at start-up

use serde::{Deserialize, Serialize};
use tech_insights_core::{Entity, Fact, FactSchemaDefinition};

use crate::{FactStore, InMemoryCatalog, StorageError};

/// Entities, fact schemas and fact rows to preload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub schemas: Vec<FactSchemaDefinition>,
    #[serde(default)]
    pub facts: Vec<Fact>,
}

impl SeedData {
    pub fn from_json_str(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load everything; schemas go in before facts so the facts can be accepted.
    pub async fn apply(
        self,
        store: &dyn FactStore,
        catalog: &InMemoryCatalog,
    ) -> Result<(), StorageError> {
        let (entities, schemas) = (self.entities.len(), self.schemas.len());

        for entity in self.entities {
            catalog.add_entity(entity);
        }
        for schema in self.schemas {
            store.insert_schema(schema).await?;
        }
        let facts = store.insert_facts(self.facts).await?;

        tracing::info!(
            "Seeded {} entities, {} fact schemas and {} fact rows",
            entities,
            schemas,
            facts
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityCatalog;
    use tech_insights_core::EntityRef;

    #[tokio::test]
    async fn test_apply_seed() {
        let raw = r#"{
            "entities": [{ "kind": "Component", "metadata": { "name": "x" } }],
            "schemas": [{
                "id": "ownership",
                "version": "1.0.0",
                "schema": { "hasOwner": { "type": "boolean", "description": "Has owner" } }
            }],
            "facts": [{
                "id": "ownership",
                "entity": { "kind": "Component", "namespace": "default", "name": "x" },
                "timestamp": "2024-01-01T00:00:00Z",
                "facts": { "hasOwner": true }
            }]
        }"#;

        let store = crate::InMemoryFactStore::new();
        let catalog = InMemoryCatalog::new();
        SeedData::from_json_str(raw)
            .unwrap()
            .apply(&store, &catalog)
            .await
            .unwrap();

        let entity = EntityRef::new("component", "default", "x");
        assert!(catalog.get_entity_by_ref(&entity).await.unwrap().is_some());
        let latest = store
            .get_latest_facts_by_ids(&["ownership".to_string()], &entity)
            .await
            .unwrap();
        assert_eq!(latest["ownership"].facts["hasOwner"], true);
    }

    #[test]
    fn test_malformed_seed() {
        assert!(matches!(
            SeedData::from_json_str("{ \"entities\": 3 }"),
            Err(StorageError::Serialization(_))
        ));
    }
}
