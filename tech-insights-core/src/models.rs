//! Core domain models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::{CoreError, EntityRef, FactSchemaEntry};

/// Check type handled by the rules engine
pub const JSON_RULES_ENGINE_CHECK_TYPE: &str = "json-rules-engine";

/// A condition tree node: `all`, `any`, `not` or a fact comparison leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
    Fact(FactCondition),
}

impl Condition {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::All { all: conditions }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Any { any: conditions }
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not {
            not: Box::new(condition),
        }
    }

    pub fn fact(fact: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Condition::Fact(FactCondition::new(fact, operator, value))
    }

    /// Every fact name the tree reads, including `{ "fact": ... }` compare values.
    pub fn fact_references(&self) -> BTreeSet<&str> {
        let mut references = BTreeSet::new();
        self.collect_fact_references(&mut references);
        references
    }

    fn collect_fact_references<'a>(&'a self, references: &mut BTreeSet<&'a str>) {
        match self {
            Condition::All { all: children } | Condition::Any { any: children } => {
                for child in children {
                    child.collect_fact_references(references);
                }
            }
            Condition::Not { not } => not.collect_fact_references(references),
            Condition::Fact(leaf) => {
                references.insert(leaf.fact.as_str());
                if let Some(other) = leaf.value_fact() {
                    references.insert(other);
                }
            }
        }
    }
}

/// Leaf comparison of one fact against a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCondition {
    pub fact: String,
    pub operator: String,
    pub value: Value,
    /// Selects a nested value inside an object-valued fact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FactCondition {
    pub fn new(fact: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            fact: fact.into(),
            operator: operator.into(),
            value,
            path: None,
        }
    }

    /// Name of the fact the compare value points at, for `{ "fact": "other" }` values.
    pub fn value_fact(&self) -> Option<&str> {
        match &self.value {
            Value::Object(map) if map.len() == 1 => map.get("fact").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Rule of a check: a top-level condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub conditions: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl Rule {
    pub fn new(conditions: Condition) -> Self {
        Self {
            conditions,
            priority: None,
        }
    }
}

/// One filter object: entity path -> expected value (or list of accepted values)
pub type FilterClause = BTreeMap<String, Value>;

/// Entity filter: a single clause or a list of clauses OR-ed together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityFilter {
    One(FilterClause),
    Many(Vec<FilterClause>),
}

impl EntityFilter {
    pub fn clauses(&self) -> &[FilterClause] {
        match self {
            EntityFilter::One(clause) => std::slice::from_ref(clause),
            EntityFilter::Many(clauses) => clauses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckLink {
    pub title: String,
    pub url: String,
}

/// A declarative check evaluated against an entity's facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    #[serde(rename = "type", default = "default_check_type")]
    pub check_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Fact retriever ids this check reads from
    pub fact_ids: Vec<String>,
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<EntityFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CheckLink>,
}

fn default_check_type() -> String {
    JSON_RULES_ENGINE_CHECK_TYPE.to_string()
}

impl Check {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        fact_ids: Vec<String>,
        conditions: Condition,
    ) -> Self {
        Self {
            id: id.into(),
            check_type: default_check_type(),
            name: name.into(),
            description: String::new(),
            fact_ids,
            rule: Rule::new(conditions),
            filter: None,
            metadata: None,
            success_metadata: None,
            failure_metadata: None,
            links: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: EntityFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Base metadata overlaid with the success or failure metadata for the outcome.
    pub fn effective_metadata(&self, passed: bool) -> Option<Map<String, Value>> {
        let overlay = if passed {
            self.success_metadata.as_ref()
        } else {
            self.failure_metadata.as_ref()
        };

        match (&self.metadata, overlay) {
            (None, None) => None,
            (base, overlay) => {
                let mut merged = base.clone().unwrap_or_default();
                if let Some(overlay) = overlay {
                    for (key, value) in overlay {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                Some(merged)
            }
        }
    }

    pub fn to_response(&self, passed: bool) -> CheckResponse {
        CheckResponse {
            id: self.id.clone(),
            check_type: self.check_type.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            fact_ids: self.fact_ids.clone(),
            metadata: self.effective_metadata(passed),
            links: self.links.clone(),
            rule: self.rule.clone(),
        }
    }
}

/// The check as reported back in a [`CheckResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub name: String,
    pub description: String,
    pub fact_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CheckLink>,
    pub rule: Rule,
}

/// A fact value annotated with its schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResultFact {
    pub value: Value,
    #[serde(flatten)]
    pub schema: FactSchemaEntry,
}

/// Outcome of evaluating one check against one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckResponse,
    pub result: bool,
    pub facts: BTreeMap<String, CheckResultFact>,
}

/// Error captured for a single entity in a bulk run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    pub name: String,
    pub message: String,
}

/// Result bundle for one entity in a bulk run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCheckResponse {
    pub entity: String,
    pub results: Vec<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub instance_path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationIssue>>,
}

impl CheckValidationResponse {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: None,
            errors: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            errors: None,
        }
    }
}

/// Request to run checks for a single entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunChecksRequest {
    #[serde(default)]
    pub checks: Option<Vec<String>>,
}

/// Entity reference as accepted in request bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRefInput {
    Ref(String),
    Compound {
        kind: String,
        #[serde(default)]
        namespace: Option<String>,
        name: String,
    },
}

impl EntityRefInput {
    pub fn to_entity_ref(&self) -> Result<EntityRef, CoreError> {
        match self {
            EntityRefInput::Ref(raw) => EntityRef::parse(raw, None),
            EntityRefInput::Compound {
                kind,
                namespace,
                name,
            } => {
                let namespace = namespace.as_deref().unwrap_or(crate::DEFAULT_NAMESPACE);
                EntityRef::parse(&format!("{}:{}/{}", kind, namespace, name), None)
            }
        }
    }
}

/// Request to run checks across many entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkRunChecksRequest {
    #[serde(default)]
    pub checks: Option<Vec<String>>,
    #[serde(default)]
    pub entities: Vec<EntityRefInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check_json() -> Value {
        json!({
            "id": "groupOwnerCheck",
            "type": "json-rules-engine",
            "name": "Group Owner Check",
            "description": "Verifies that a group has been set as the spec.owner for this entity",
            "factIds": ["entityOwnershipFactRetriever"],
            "rule": {
                "conditions": {
                    "all": [
                        { "fact": "hasGroupOwner", "operator": "equal", "value": true },
                        { "not": { "fact": "ownerName", "operator": "equal", "value": "unknown" } }
                    ]
                }
            },
            "filter": { "kind": "component" },
            "metadata": { "category": "ownership", "rank": 1 },
            "failureMetadata": { "solution": "Set spec.owner to a group" }
        })
    }

    #[test]
    fn test_check_parses_condition_tree() {
        let check: Check = serde_json::from_value(check_json()).unwrap();

        let Condition::All { all } = &check.rule.conditions else {
            panic!("expected an all node");
        };
        assert_eq!(all.len(), 2);
        assert!(matches!(&all[0], Condition::Fact(leaf) if leaf.fact == "hasGroupOwner"));
        assert!(matches!(&all[1], Condition::Not { .. }));
        assert_eq!(check.filter.as_ref().unwrap().clauses().len(), 1);
    }

    #[test]
    fn test_check_round_trips_wire_names() {
        let check: Check = serde_json::from_value(check_json()).unwrap();
        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(value["factIds"], json!(["entityOwnershipFactRetriever"]));
        assert_eq!(value["type"], "json-rules-engine");
        assert!(value.get("successMetadata").is_none());
    }

    #[test]
    fn test_effective_metadata_overlays_outcome() {
        let check: Check = serde_json::from_value(check_json()).unwrap();

        let failed = check.effective_metadata(false).unwrap();
        assert_eq!(failed["category"], "ownership");
        assert_eq!(failed["solution"], "Set spec.owner to a group");

        let passed = check.effective_metadata(true).unwrap();
        assert!(passed.get("solution").is_none());
    }

    #[test]
    fn test_fact_references_walk_the_tree() {
        let condition = Condition::any(vec![
            Condition::fact("hasOwner", "equal", json!(true)),
            Condition::not(Condition::all(vec![
                Condition::fact("coverage", "lessThan", json!({ "fact": "minCoverage" })),
                Condition::fact("hasOwner", "equal", json!(false)),
            ])),
        ]);

        let references: Vec<&str> = condition.fact_references().into_iter().collect();
        assert_eq!(references, vec!["coverage", "hasOwner", "minCoverage"]);
    }

    #[test]
    fn test_value_fact_reference() {
        let leaf = FactCondition::new("coverage", "greaterThanInclusive", json!({ "fact": "minCoverage" }));
        assert_eq!(leaf.value_fact(), Some("minCoverage"));

        let literal = FactCondition::new("coverage", "equal", json!({ "fact": "x", "other": 1 }));
        assert_eq!(literal.value_fact(), None);
    }

    #[test]
    fn test_bulk_request_accepts_mixed_refs() {
        let request: BulkRunChecksRequest = serde_json::from_value(json!({
            "entities": [
                "component:default/a",
                { "kind": "component", "name": "b" }
            ]
        }))
        .unwrap();

        let refs: Vec<String> = request
            .entities
            .iter()
            .map(|e| e.to_entity_ref().unwrap().to_string())
            .collect();
        assert_eq!(refs, vec!["component:default/a", "component:default/b"]);
        assert!(request.checks.is_none());
    }
}
