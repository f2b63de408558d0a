//! Condition tree evaluation

use serde_json::{Map, Value};
use tech_insights_core::{path, Condition, FactCondition};

use crate::{EngineError, OperatorRegistry};

static NULL: Value = Value::Null;

/// Evaluate a condition tree against fact values with short-circuiting.
///
/// `all` of nothing is true and `any` of nothing is false.
pub fn evaluate(
    condition: &Condition,
    facts: &Map<String, Value>,
    operators: &OperatorRegistry,
) -> Result<bool, EngineError> {
    match condition {
        Condition::All { all } => {
            for child in all {
                if !evaluate(child, facts, operators)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any { any } => {
            for child in any {
                if evaluate(child, facts, operators)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not { not } => Ok(!evaluate(not, facts, operators)?),
        Condition::Fact(leaf) => evaluate_leaf(leaf, facts, operators),
    }
}

fn evaluate_leaf(
    leaf: &FactCondition,
    facts: &Map<String, Value>,
    operators: &OperatorRegistry,
) -> Result<bool, EngineError> {
    let fact_value = lookup(facts, &leaf.fact)?;
    // A path that selects nothing compares as null
    let fact_value = match &leaf.path {
        Some(selector) => path::get_path(fact_value, selector).unwrap_or(&NULL),
        None => fact_value,
    };

    let compare_value = match leaf.value_fact() {
        Some(other) => lookup(facts, other)?,
        None => &leaf.value,
    };

    operators.evaluate(&leaf.operator, fact_value, compare_value)
}

fn lookup<'a>(facts: &'a Map<String, Value>, name: &str) -> Result<&'a Value, EngineError> {
    facts
        .get(name)
        .ok_or_else(|| EngineError::UndefinedFact(name.to_string()))
}
