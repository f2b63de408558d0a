//! Facts and fact schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::EntityFilter;
use crate::EntityRef;

/// Value type declared for a fact in its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactValueType {
    Integer,
    Float,
    String,
    Boolean,
    Datetime,
    Set,
    Object,
}

/// Schema metadata for a single named fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSchemaEntry {
    #[serde(rename = "type")]
    pub value_type: FactValueType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl FactSchemaEntry {
    pub fn new(value_type: FactValueType, description: impl Into<String>) -> Self {
        Self {
            value_type,
            description: description.into(),
            since: None,
            metadata: None,
        }
    }
}

/// Fact name -> schema entry
pub type FactSchema = BTreeMap<String, FactSchemaEntry>;

/// Versioned schema published by one fact retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactSchemaDefinition {
    /// Fact retriever id
    pub id: String,
    pub version: semver::Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_filter: Option<EntityFilter>,
    pub schema: FactSchema,
}

impl FactSchemaDefinition {
    pub fn new(id: impl Into<String>, version: semver::Version, schema: FactSchema) -> Self {
        Self {
            id: id.into(),
            version,
            entity_filter: None,
            schema,
        }
    }
}

/// One row of facts produced by a retriever for an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    /// Fact retriever id
    pub id: String,
    pub entity: EntityRef,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub facts: serde_json::Map<String, serde_json::Value>,
}

impl Fact {
    pub fn new(
        id: impl Into<String>,
        entity: EntityRef,
        facts: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            entity,
            timestamp: Utc::now(),
            version: None,
            facts,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
