//! JSON schema describing the condition grammar

use serde_json::{json, Value};

/// Schema for a rule: `{ conditions, priority? }` where `conditions` is a
/// top-level `all`/`any`/`not` node and leaves use one of `operators`.
pub fn rule_schema<S: AsRef<str>>(operators: &[S]) -> Value {
    let operators: Vec<&str> = operators.iter().map(AsRef::as_ref).collect();

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "definitions": {
            "condition": {
                "oneOf": [
                    { "$ref": "#/definitions/all" },
                    { "$ref": "#/definitions/any" },
                    { "$ref": "#/definitions/not" },
                    { "$ref": "#/definitions/fact" }
                ]
            },
            "topLevelCondition": {
                "oneOf": [
                    { "$ref": "#/definitions/all" },
                    { "$ref": "#/definitions/any" },
                    { "$ref": "#/definitions/not" }
                ]
            },
            "all": {
                "type": "object",
                "required": ["all"],
                "properties": {
                    "all": { "type": "array", "items": { "$ref": "#/definitions/condition" } }
                },
                "additionalProperties": false
            },
            "any": {
                "type": "object",
                "required": ["any"],
                "properties": {
                    "any": { "type": "array", "items": { "$ref": "#/definitions/condition" } }
                },
                "additionalProperties": false
            },
            "not": {
                "type": "object",
                "required": ["not"],
                "properties": {
                    "not": { "$ref": "#/definitions/condition" }
                },
                "additionalProperties": false
            },
            "fact": {
                "type": "object",
                "required": ["fact", "operator", "value"],
                "properties": {
                    "fact": { "type": "string", "minLength": 1 },
                    "operator": { "type": "string", "enum": operators },
                    "value": {},
                    "path": { "type": "string" }
                },
                "additionalProperties": false
            }
        },
        "type": "object",
        "required": ["conditions"],
        "properties": {
            "conditions": { "$ref": "#/definitions/topLevelCondition" },
            "priority": { "type": "integer", "minimum": 1 }
        },
        "additionalProperties": false
    })
}
