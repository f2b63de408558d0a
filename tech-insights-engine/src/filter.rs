//! Entity filter evaluation
//!
//! A filter is one clause or a list of clauses. The entity matches if any
//! clause matches; a clause matches if every `path: expected` pair matches.

use serde_json::Value;
use tech_insights_core::{path, Entity, EntityFilter, FilterClause};

use crate::operators::numbers_eq;
use crate::EngineError;

/// Does the JSON view of an entity satisfy the filter?
pub fn matches(entity: &Value, filter: &EntityFilter) -> bool {
    filter
        .clauses()
        .iter()
        .any(|clause| clause_matches(entity, clause))
}

/// Convenience wrapper over [`matches`] for typed entities.
pub fn entity_matches(entity: &Entity, filter: &EntityFilter) -> Result<bool, EngineError> {
    Ok(matches(&entity.to_value()?, filter))
}

fn clause_matches(entity: &Value, clause: &FilterClause) -> bool {
    clause.iter().all(|(key, expected)| match path::get_defined(entity, key) {
        Some(actual) => value_matches(actual, expected),
        None => {
            tracing::debug!("Entity has no value at '{}', filter clause does not match", key);
            false
        }
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(accepted) => accepted.iter().any(|e| single_matches(actual, e)),
        _ => single_matches(actual, expected),
    }
}

fn single_matches(actual: &Value, expected: &Value) -> bool {
    match actual {
        // One level of "contains"; nested arrays are compared as values
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        _ => scalar_eq(actual, expected),
    }
}

fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Number(a), Value::Number(b)) => numbers_eq(a, b),
        _ => actual == expected,
    }
}
