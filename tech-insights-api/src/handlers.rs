//! API request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tech_insights_core::{
    BulkRunChecksRequest, EntityRef, EntityRefInput, Fact, FactSchemaDefinition,
    RunChecksRequest,
};
use tech_insights_engine::run_bulk;

use crate::{ApiError, AppState};

/// Raw query pairs; `ids` may be repeated, comma separated or sent as `ids[]`.
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn require(&self, name: &str) -> Result<&str, ApiError> {
        self.get(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter '{}'", name)))
    }

    fn list(&self, name: &str) -> Vec<String> {
        let array_name = format!("{}[]", name);
        self.0
            .iter()
            .filter(|(key, _)| key == name || *key == array_name)
            .flat_map(|(_, value)| value.split(','))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }

    fn entity(&self) -> Result<EntityRef, ApiError> {
        Ok(EntityRef::parse(self.require("entity")?, None)?)
    }

    fn required_ids(&self) -> Result<Vec<String>, ApiError> {
        let ids = self.list("ids");
        if ids.is_empty() {
            return Err(ApiError::BadRequest(
                "Missing query parameter 'ids'".to_string(),
            ));
        }
        Ok(ids)
    }

    fn datetime(&self, name: &str) -> Result<DateTime<Utc>, ApiError> {
        let raw = self.require(name)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ApiError::BadRequest(format!("Invalid '{}' value '{}': {}", name, raw, e)))
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "tech-insights"
    }))
}

// ==================== Check Handlers ====================

/// List all configured checks
pub async fn list_checks(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let checks = state.fact_checker.get_checks().await?;
    Ok(Json(checks))
}

/// Run checks for one entity
pub async fn run_checks(
    State(state): State<Arc<AppState>>,
    Path((namespace, kind, name)): Path<(String, String, String)>,
    body: Option<Json<RunChecksRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let entity = EntityRef::parse(&format!("{}:{}/{}", kind, namespace, name), None)?;
    let request = body.map(|Json(req)| req).unwrap_or_default();

    tracing::debug!("Running checks for {}", entity);
    let results = state
        .fact_checker
        .run_checks(&entity, request.checks.as_deref())
        .await?;

    Ok(Json(results))
}

/// Run checks for many entities; failures are reported per entity
pub async fn run_checks_bulk(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkRunChecksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entities = req
        .entities
        .iter()
        .map(EntityRefInput::to_entity_ref)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!("Running checks for {} entities", entities.len());
    let responses = run_bulk(
        state.fact_checker.clone(),
        entities,
        req.checks,
        state.concurrency,
    )
    .await?;

    Ok(Json(responses))
}

/// Validate a check definition without registering it
pub async fn validate_check(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.fact_checker.validate_document(&raw).await?;
    Ok(Json(response))
}

// ==================== Fact Handlers ====================

/// Latest fact schemas, optionally restricted to `ids`
pub async fn get_fact_schemas(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = QueryParams(params).list("ids");
    let filter = if ids.is_empty() { None } else { Some(ids.as_slice()) };
    let schemas = state.fact_store.get_latest_schemas(filter).await?;
    Ok(Json(schemas))
}

pub async fn insert_fact_schema(
    State(state): State<Arc<AppState>>,
    Json(schema): Json<FactSchemaDefinition>,
) -> Result<impl IntoResponse, ApiError> {
    state.fact_store.insert_schema(schema.clone()).await?;
    tracing::info!("Registered fact schema '{}' version {}", schema.id, schema.version);
    Ok((StatusCode::CREATED, Json(schema)))
}

pub async fn insert_facts(
    State(state): State<Arc<AppState>>,
    Json(facts): Json<Vec<Fact>>,
) -> Result<impl IntoResponse, ApiError> {
    let inserted = state.fact_store.insert_facts(facts).await?;
    tracing::debug!("Inserted {} fact rows", inserted);
    Ok((StatusCode::CREATED, Json(json!({ "inserted": inserted }))))
}

/// Latest fact row per retriever id for an entity
pub async fn get_latest_facts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let params = QueryParams(params);
    let entity = params.entity()?;
    let ids = params.required_ids()?;

    let facts = state
        .fact_store
        .get_latest_facts_by_ids(&ids, &entity)
        .await?;
    Ok(Json(facts))
}

/// Fact rows per retriever id within a time window
pub async fn get_facts_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let params = QueryParams(params);
    let entity = params.entity()?;
    let ids = params.required_ids()?;
    let start = params.datetime("startDatetime")?;
    let end = params.datetime("endDatetime")?;
    if start > end {
        return Err(ApiError::BadRequest(
            "startDatetime must not be after endDatetime".to_string(),
        ));
    }

    let facts = state
        .fact_store
        .get_facts_between_timestamps_by_ids(&ids, &entity, start, end)
        .await?;
    Ok(Json(facts))
}
