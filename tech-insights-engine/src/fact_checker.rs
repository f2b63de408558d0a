//! Fact checker: runs checks for an entity against its latest facts

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tech_insights_core::{
    Check, CheckResult, CheckResultFact, CheckValidationResponse, Entity, EntityRef, Fact,
    FactSchemaDefinition, FactSchemaEntry, ValidationIssue,
};
use tech_insights_storage::{CheckRegistry, EntityCatalog, FactStore, InMemoryCheckRegistry};
use tech_insights_validator::CheckValidator;

use crate::{condition, filter, EngineError, Operator, OperatorRegistry};

/// Evaluates checks of the `json-rules-engine` type.
///
/// The registry, stores and operator table are fixed at construction;
/// every run works on a fresh snapshot of facts read from the fact store.
pub struct FactChecker {
    registry: Arc<dyn CheckRegistry>,
    fact_store: Arc<dyn FactStore>,
    catalog: Option<Arc<dyn EntityCatalog>>,
    operators: OperatorRegistry,
    validator: CheckValidator,
}

#[derive(Default)]
pub struct FactCheckerBuilder {
    fact_store: Option<Arc<dyn FactStore>>,
    catalog: Option<Arc<dyn EntityCatalog>>,
    registry: Option<Arc<dyn CheckRegistry>>,
    checks: Vec<Check>,
    documents: Vec<Value>,
    operators: Vec<Arc<dyn Operator>>,
}

impl FactCheckerBuilder {
    pub fn fact_store(mut self, store: Arc<dyn FactStore>) -> Self {
        self.fact_store = Some(store);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn EntityCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use an externally managed registry instead of [`checks`](Self::checks).
    pub fn check_registry(mut self, registry: Arc<dyn CheckRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn checks(mut self, checks: Vec<Check>) -> Self {
        self.checks = checks;
        self
    }

    /// Raw check definitions, as read from configuration. Each document is
    /// checked against the condition grammar before it is parsed.
    pub fn check_documents(mut self, documents: Vec<Value>) -> Self {
        self.documents = documents;
        self
    }

    pub fn operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operators.push(operator);
        self
    }

    /// Build the checker, validating the grammar of every supplied check.
    pub fn build(self) -> Result<FactChecker, EngineError> {
        let fact_store = self
            .fact_store
            .ok_or_else(|| EngineError::Configuration("A fact store is required".to_string()))?;

        let mut operators = OperatorRegistry::new();
        for operator in self.operators {
            operators.register(operator)?;
        }
        let validator = CheckValidator::new(&operators.names())?;

        let mut checks = self.checks;
        for check in &checks {
            if let Err(issues) = validator.validate_rule(&check.rule) {
                return Err(EngineError::InvalidCheck {
                    check_id: check.id.clone(),
                    message: describe_issues(&issues),
                });
            }
        }
        for document in &self.documents {
            let check = validator.validate_document(document).map_err(|response| {
                EngineError::InvalidCheck {
                    check_id: document
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or("<unnamed>")
                        .to_string(),
                    message: match &response.errors {
                        Some(issues) => describe_issues(issues),
                        None => response.message.unwrap_or_default(),
                    },
                }
            })?;
            checks.push(check);
        }

        let registry: Arc<dyn CheckRegistry> = match self.registry {
            Some(registry) if checks.is_empty() => registry,
            Some(_) => {
                return Err(EngineError::Configuration(
                    "Provide either checks or a check registry, not both".to_string(),
                ))
            }
            None => Arc::new(InMemoryCheckRegistry::with_checks(checks)?),
        };

        Ok(FactChecker {
            registry,
            fact_store,
            catalog: self.catalog,
            operators,
            validator,
        })
    }
}

impl FactChecker {
    pub fn builder() -> FactCheckerBuilder {
        FactCheckerBuilder::default()
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// All configured checks
    pub async fn get_checks(&self) -> Result<Vec<Check>, EngineError> {
        Ok(self.registry.list().await?)
    }

    /// Validate a check against the grammar and the latest schemas of its fact retrievers.
    pub async fn validate(&self, check: &Check) -> Result<CheckValidationResponse, EngineError> {
        let schemas = self
            .fact_store
            .get_latest_schemas(Some(&check.fact_ids))
            .await?;
        Ok(self.validator.validate(check, &schemas))
    }

    /// Validate a check definition as submitted, before it is parsed.
    pub async fn validate_document(
        &self,
        document: &Value,
    ) -> Result<CheckValidationResponse, EngineError> {
        match self.validator.validate_document(document) {
            Ok(check) => self.validate(&check).await,
            Err(response) => Ok(response),
        }
    }

    /// Whether any of the selected checks has an entity filter, i.e. whether a
    /// run needs the entity from the catalog at all.
    pub async fn has_filtered_checks(
        &self,
        check_ids: Option<&[String]>,
    ) -> Result<bool, EngineError> {
        let checks = self.resolve_checks(check_ids).await?;
        Ok(checks.iter().any(|c| c.filter.is_some()))
    }

    /// Run checks for an entity reference.
    ///
    /// The entity is only fetched when a selected check has a filter. If it cannot
    /// be fetched every check runs unfiltered.
    pub async fn run_checks(
        &self,
        entity: &EntityRef,
        check_ids: Option<&[String]>,
    ) -> Result<Vec<CheckResult>, EngineError> {
        let checks = self.resolve_checks(check_ids).await?;

        let checks = if checks.iter().any(|c| c.filter.is_some()) {
            match self.fetch_entity_for_filtering(entity).await {
                Some(found) => filter_checks(checks, &found)?,
                None => checks,
            }
        } else {
            checks
        };

        self.evaluate_checks(entity, checks).await
    }

    /// Run checks for an entity that has already been fetched from the catalog.
    pub async fn run_checks_for_entity(
        &self,
        entity: &Entity,
        check_ids: Option<&[String]>,
    ) -> Result<Vec<CheckResult>, EngineError> {
        let checks = self.resolve_checks(check_ids).await?;
        let checks = filter_checks(checks, entity)?;
        self.evaluate_checks(&entity.entity_ref(), checks).await
    }

    /// Fetch an entity, treating catalog failures and missing entities as errors.
    pub async fn resolve_entity(&self, entity: &EntityRef) -> Result<Entity, EngineError> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            EngineError::Configuration("No catalog is configured".to_string())
        })?;
        catalog
            .get_entity_by_ref(entity)
            .await
            .map_err(|e| EngineError::Catalog {
                entity: entity.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| EngineError::EntityNotFound(entity.to_string()))
    }

    /// Every entity the catalog knows
    pub async fn list_entities(&self) -> Result<Vec<Entity>, EngineError> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            EngineError::Configuration("No catalog is configured".to_string())
        })?;
        Ok(catalog.list_entities().await?)
    }

    async fn resolve_checks(&self, check_ids: Option<&[String]>) -> Result<Vec<Check>, EngineError> {
        Ok(match check_ids {
            Some(ids) => self.registry.get_all(ids).await?,
            None => self.registry.list().await?,
        })
    }

    async fn fetch_entity_for_filtering(&self, entity: &EntityRef) -> Option<Entity> {
        let Some(catalog) = &self.catalog else {
            tracing::warn!(
                "No catalog configured to filter checks for {}, running all checks",
                entity
            );
            return None;
        };

        match catalog.get_entity_by_ref(entity).await {
            Ok(Some(found)) => Some(found),
            Ok(None) => {
                tracing::warn!("Entity {} not found in catalog, running all checks", entity);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch entity {} for check filtering, running all checks: {}",
                    entity,
                    e
                );
                None
            }
        }
    }

    async fn evaluate_checks(
        &self,
        entity: &EntityRef,
        checks: Vec<Check>,
    ) -> Result<Vec<CheckResult>, EngineError> {
        if checks.is_empty() {
            return Ok(Vec::new());
        }

        let fact_ids: Vec<String> = checks
            .iter()
            .flat_map(|c| c.fact_ids.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let latest = self
            .fact_store
            .get_latest_facts_by_ids(&fact_ids, entity)
            .await?;
        let schemas = self.fact_store.get_latest_schemas(Some(&fact_ids)).await?;

        // Misconfigured fact references fail the run before anything is evaluated
        let known = known_facts(&schemas);
        for check in &checks {
            let missing: Vec<String> = check
                .rule
                .conditions
                .fact_references()
                .into_iter()
                .filter(|fact| !known.contains_key(fact))
                .map(str::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(EngineError::UnknownFacts {
                    check_id: check.id.clone(),
                    facts: missing,
                });
            }
        }

        let mut results = Vec::with_capacity(checks.len());
        for check in &checks {
            let values = fact_values(check, &latest);

            let references = check.rule.conditions.fact_references();
            let unpopulated: Vec<&str> = references
                .iter()
                .copied()
                .filter(|fact| !values.contains_key(*fact))
                .collect();
            if !unpopulated.is_empty() {
                tracing::debug!(
                    "Skipping check {} for {}, facts not populated: {}",
                    check.id,
                    entity,
                    unpopulated.join(", ")
                );
                continue;
            }

            let passed = condition::evaluate(&check.rule.conditions, &values, &self.operators)?;

            let facts = references
                .into_iter()
                .filter_map(|name| {
                    let schema = fact_schema(check, &schemas, name)
                        .or_else(|| known.get(name).copied())?;
                    let value = values.get(name)?;
                    Some((
                        name.to_string(),
                        CheckResultFact {
                            value: value.clone(),
                            schema: schema.clone(),
                        },
                    ))
                })
                .collect();

            results.push(CheckResult {
                check: check.to_response(passed),
                result: passed,
                facts,
            });
        }

        Ok(results)
    }
}

fn filter_checks(checks: Vec<Check>, entity: &Entity) -> Result<Vec<Check>, EngineError> {
    let view = entity.to_value()?;
    Ok(checks
        .into_iter()
        .filter(|check| match &check.filter {
            Some(entity_filter) => {
                let matched = filter::matches(&view, entity_filter);
                if !matched {
                    tracing::debug!(
                        "Check {} does not apply to {}",
                        check.id,
                        entity.entity_ref()
                    );
                }
                matched
            }
            None => true,
        })
        .collect())
}

fn describe_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} ({})", issue.message, issue.instance_path))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fact name -> schema entry across every schema fetched for the run
fn known_facts(schemas: &[FactSchemaDefinition]) -> BTreeMap<&str, &FactSchemaEntry> {
    schemas
        .iter()
        .flat_map(|schema| schema.schema.iter().map(|(name, entry)| (name.as_str(), entry)))
        .collect()
}

/// Schema entry for `name` from the check's own retrievers
fn fact_schema<'a>(
    check: &Check,
    schemas: &'a [FactSchemaDefinition],
    name: &str,
) -> Option<&'a FactSchemaEntry> {
    schemas
        .iter()
        .filter(|schema| check.fact_ids.contains(&schema.id))
        .find_map(|schema| schema.schema.get(name))
}

/// Every fetched fact value for the entity. Rows of the check's own
/// retrievers are applied last so they win on name clashes.
fn fact_values(check: &Check, latest: &BTreeMap<String, Fact>) -> Map<String, Value> {
    let (own, others): (Vec<_>, Vec<_>) = latest
        .iter()
        .partition(|(id, _)| check.fact_ids.contains(*id));
    let mut values = Map::new();
    for (_, row) in others.into_iter().chain(own) {
        for (name, value) in &row.facts {
            values.insert(name.clone(), value.clone());
        }
    }
    values
}
