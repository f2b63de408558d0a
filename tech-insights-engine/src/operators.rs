//! Comparison operators used by fact condition leaves

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::EngineError;

/// A named comparison between a fact value and a compare value
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, fact_value: &Value, compare_value: &Value) -> bool;
}

/// Operator backed by a function or closure
pub struct FnOperator<F> {
    name: String,
    func: F,
}

impl<F> FnOperator<F>
where
    F: Fn(&Value, &Value) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Operator for FnOperator<F>
where
    F: Fn(&Value, &Value) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, fact_value: &Value, compare_value: &Value) -> bool {
        (self.func)(fact_value, compare_value)
    }
}

/// Numeric equality. Integers compare exactly; a float on either side
/// compares both as `f64` so `1 == 1.0`.
pub(crate) fn numbers_eq(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return a.as_f64() == b.as_f64();
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_u64() == b.as_u64(),
    }
}

/// Equality where numbers compare by value (`1 == 1.0`)
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Numeric view of a fact value; numeric strings are accepted.
fn fact_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_numbers(fact: &Value, compare: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (fact_number(fact), compare.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn equal(fact: &Value, compare: &Value) -> bool {
    json_eq(fact, compare)
}

fn not_equal(fact: &Value, compare: &Value) -> bool {
    !json_eq(fact, compare)
}

fn less_than(fact: &Value, compare: &Value) -> bool {
    compare_numbers(fact, compare, |a, b| a < b)
}

fn less_than_inclusive(fact: &Value, compare: &Value) -> bool {
    compare_numbers(fact, compare, |a, b| a <= b)
}

fn greater_than(fact: &Value, compare: &Value) -> bool {
    compare_numbers(fact, compare, |a, b| a > b)
}

fn greater_than_inclusive(fact: &Value, compare: &Value) -> bool {
    compare_numbers(fact, compare, |a, b| a >= b)
}

fn is_in(fact: &Value, compare: &Value) -> bool {
    compare
        .as_array()
        .is_some_and(|options| options.iter().any(|o| json_eq(fact, o)))
}

fn not_in(fact: &Value, compare: &Value) -> bool {
    compare
        .as_array()
        .is_some_and(|options| !options.iter().any(|o| json_eq(fact, o)))
}

fn contains(fact: &Value, compare: &Value) -> bool {
    fact.as_array()
        .is_some_and(|items| items.iter().any(|i| json_eq(i, compare)))
}

fn does_not_contain(fact: &Value, compare: &Value) -> bool {
    fact.as_array()
        .is_some_and(|items| !items.iter().any(|i| json_eq(i, compare)))
}

const BUILT_INS: &[(&str, fn(&Value, &Value) -> bool)] = &[
    ("equal", equal),
    ("notEqual", not_equal),
    ("lessThan", less_than),
    ("lessThanInclusive", less_than_inclusive),
    ("greaterThan", greater_than),
    ("greaterThanInclusive", greater_than_inclusive),
    ("in", is_in),
    ("notIn", not_in),
    ("contains", contains),
    ("doesNotContain", does_not_contain),
];

/// Operator name -> operator. Registering a name again replaces the previous operator.
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Registry with the built-in operators
    pub fn new() -> Self {
        let mut operators: BTreeMap<String, Arc<dyn Operator>> = BTreeMap::new();
        for (name, func) in BUILT_INS {
            operators.insert(name.to_string(), Arc::new(FnOperator::new(*name, *func)));
        }
        Self { operators }
    }

    pub fn register(&mut self, operator: Arc<dyn Operator>) -> Result<(), EngineError> {
        let name = operator.name().trim();
        if name.is_empty() {
            return Err(EngineError::Configuration(
                "Operators must have a non-empty name".to_string(),
            ));
        }
        if self.operators.contains_key(name) {
            tracing::debug!("Replacing operator '{}'", name);
        }
        self.operators.insert(name.to_string(), operator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.operators.keys().map(String::as_str).collect()
    }

    pub fn evaluate(
        &self,
        name: &str,
        fact_value: &Value,
        compare_value: &Value,
    ) -> Result<bool, EngineError> {
        let operator = self
            .get(name)
            .ok_or_else(|| EngineError::UnknownOperator(name.to_string()))?;
        Ok(operator.evaluate(fact_value, compare_value))
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
