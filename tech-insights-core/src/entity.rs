//! Catalog entities and entity references

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::CoreError;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Reference to a catalog entity in the form `kind:namespace/name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `kind:namespace/name`, `kind:name`, `namespace/name` or `name`.
    ///
    /// The namespace falls back to [`DEFAULT_NAMESPACE`]; the kind falls back to
    /// `default_kind` and is required when neither is present.
    pub fn parse(input: &str, default_kind: Option<&str>) -> Result<Self, CoreError> {
        let input = input.trim();
        let (kind, rest) = match input.split_once(':') {
            Some((kind, rest)) => (Some(kind), rest),
            None => (None, input),
        };
        let (namespace, name) = match rest.split_once('/') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, rest),
        };

        let kind = kind.or(default_kind).ok_or_else(|| {
            CoreError::InvalidEntityRef(format!("'{}' does not specify a kind", input))
        })?;

        if kind.is_empty() || name.is_empty() || namespace.is_some_and(str::is_empty) {
            return Err(CoreError::InvalidEntityRef(format!(
                "'{}' must be of the form kind:namespace/name",
                input
            )));
        }
        if name.contains(':') || name.contains('/') {
            return Err(CoreError::InvalidEntityRef(format!(
                "'{}' has too many separators",
                input
            )));
        }

        Ok(Self::new(
            kind,
            namespace.unwrap_or(DEFAULT_NAMESPACE),
            name,
        ))
    }

    /// Lower-cased `kind:namespace/name`, used as the lookup key by stores.
    pub fn canonical(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.namespace, self.name)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for EntityRef {}

impl std::hash::Hash for EntityRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl std::str::FromStr for EntityRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, None)
    }
}

/// Entity metadata. Unknown keys are kept in `extra` so filters can reach them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A catalog entity, read-only from the fact checker's point of view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<serde_json::Value>,
}

fn default_api_version() -> String {
    "backstage.io/v1alpha1".to_string()
}

impl Entity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: kind.into(),
            metadata: EntityMeta {
                name: name.into(),
                ..Default::default()
            },
            spec: None,
            relations: Vec::new(),
        }
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(
            self.kind.clone(),
            self.metadata
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            self.metadata.name.clone(),
        )
    }

    /// JSON view of the entity, used for path lookups. A missing namespace
    /// reads as [`DEFAULT_NAMESPACE`], matching [`Entity::entity_ref`].
    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            metadata
                .entry("namespace")
                .or_insert_with(|| serde_json::Value::String(DEFAULT_NAMESPACE.to_string()));
        }
        Ok(value)
    }
}
