//! Check validator

use serde_json::Value;
use std::collections::BTreeSet;
use tech_insights_core::{
    Check, CheckValidationResponse, FactSchemaDefinition, Rule, ValidationIssue,
    JSON_RULES_ENGINE_CHECK_TYPE,
};

use crate::{rule_schema, ValidatorError};

/// Validates checks against the condition grammar and their fact schemas
pub struct CheckValidator {
    schema: jsonschema::Validator,
}

impl CheckValidator {
    /// Build a validator accepting the given operator names in leaf conditions
    pub fn new<S: AsRef<str>>(operators: &[S]) -> Result<Self, ValidatorError> {
        let schema = jsonschema::validator_for(&rule_schema(operators))
            .map_err(|e| ValidatorError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Validate a rule against the condition grammar.
    pub fn validate_rule(&self, rule: &Rule) -> Result<(), Vec<ValidationIssue>> {
        let value = serde_json::to_value(rule).map_err(|e| {
            vec![ValidationIssue {
                instance_path: String::new(),
                message: e.to_string(),
            }]
        })?;
        self.validate_rule_value(&value)
    }

    /// Validate a raw rule document against the condition grammar.
    pub fn validate_rule_value(&self, rule: &Value) -> Result<(), Vec<ValidationIssue>> {
        let issues: Vec<ValidationIssue> = self
            .schema
            .iter_errors(rule)
            .map(|e| ValidationIssue {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Parse a raw check document. The type and the rule grammar are checked
    /// on the document as written, since parsing drops keys the grammar rejects.
    pub fn validate_document(&self, document: &Value) -> Result<Check, CheckValidationResponse> {
        if let Some(check_type) = document.get("type") {
            if check_type.as_str() != Some(JSON_RULES_ENGINE_CHECK_TYPE) {
                return Err(CheckValidationResponse::invalid(format!(
                    "Only {} checks can be validated, got '{}'",
                    JSON_RULES_ENGINE_CHECK_TYPE,
                    check_type.as_str().map_or_else(|| check_type.to_string(), str::to_string)
                )));
            }
        }

        let rule = document.get("rule").cloned().unwrap_or(Value::Null);
        if let Err(errors) = self.validate_rule_value(&rule) {
            tracing::debug!("Check document failed grammar validation: {:?}", errors);
            return Err(grammar_failure(errors));
        }

        serde_json::from_value(document.clone()).map_err(|e| {
            CheckValidationResponse::invalid(format!("Invalid check definition: {}", e))
        })
    }

    /// Full validation: check type, rule grammar, and fact references against
    /// `schemas` (the latest schemas of the check's fact retrievers).
    pub fn validate(
        &self,
        check: &Check,
        schemas: &[FactSchemaDefinition],
    ) -> CheckValidationResponse {
        if check.check_type != JSON_RULES_ENGINE_CHECK_TYPE {
            return CheckValidationResponse::invalid(format!(
                "Only {} checks can be validated, got '{}'",
                JSON_RULES_ENGINE_CHECK_TYPE, check.check_type
            ));
        }

        if let Err(errors) = self.validate_rule(&check.rule) {
            tracing::debug!("Check {} failed grammar validation: {:?}", check.id, errors);
            return grammar_failure(errors);
        }

        let declared: BTreeSet<&str> = schemas
            .iter()
            .filter(|s| check.fact_ids.contains(&s.id))
            .flat_map(|s| s.schema.keys().map(String::as_str))
            .collect();
        let missing: Vec<&str> = check
            .rule
            .conditions
            .fact_references()
            .into_iter()
            .filter(|fact| !declared.contains(fact))
            .collect();

        if !missing.is_empty() {
            return CheckValidationResponse::invalid(format!(
                "Not all facts are defined: {}",
                missing.join(", ")
            ));
        }

        CheckValidationResponse::valid()
    }
}

fn grammar_failure(errors: Vec<ValidationIssue>) -> CheckValidationResponse {
    CheckValidationResponse {
        valid: false,
        message: Some("Failed to validate conditions against JSON schema".to_string()),
        errors: Some(errors),
    }
}
