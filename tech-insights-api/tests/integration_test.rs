use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tech_insights_api::{create_router, AppState};
use tech_insights_core::{
    Check, Condition, Entity, EntityFilter, EntityRef, Fact, FactSchema, FactSchemaDefinition,
    FactSchemaEntry, FactValueType, FilterClause,
};
use tech_insights_engine::FactChecker;
use tech_insights_storage::{
    EntityCatalog, FactStore, InMemoryCatalog, InMemoryFactStore, StorageError,
};
use tower::ServiceExt; // for oneshot

/// Catalog whose lookups fail for one entity name
struct BrokenCatalog {
    inner: InMemoryCatalog,
    failing: &'static str,
}

#[async_trait]
impl EntityCatalog for BrokenCatalog {
    async fn get_entity_by_ref(&self, entity: &EntityRef) -> Result<Option<Entity>, StorageError> {
        if entity.name == self.failing {
            return Err(StorageError::Connection("catalog unavailable".to_string()));
        }
        self.inner.get_entity_by_ref(entity).await
    }

    async fn list_entities(&self) -> Result<Vec<Entity>, StorageError> {
        self.inner.list_entities().await
    }
}

fn owner_check() -> Check {
    let mut check = Check::new(
        "productOwnerCheck",
        "Product Owner",
        vec!["ownership".to_string()],
        Condition::all(vec![Condition::fact("hasProductOwner", "equal", json!(true))]),
    );
    check.metadata = Some(Map::from_iter([("level".to_string(), json!("bronze"))]));
    check.failure_metadata = Some(Map::from_iter([("hint".to_string(), json!("Set spec.owner"))]));
    check.with_filter(EntityFilter::One(FilterClause::from_iter([(
        "kind".to_string(),
        json!("component"),
    )])))
}

fn unfiltered_owner_check() -> Check {
    let mut check = owner_check();
    check.filter = None;
    check
}

fn missing_fact_check() -> Check {
    Check::new(
        "brokenCheck",
        "Broken",
        vec!["ownership".to_string()],
        Condition::all(vec![Condition::fact("missingFact", "equal", json!(true))]),
    )
}

async fn seed_store() -> Arc<InMemoryFactStore> {
    let store = Arc::new(InMemoryFactStore::new());
    let mut schema = FactSchema::new();
    schema.insert(
        "hasProductOwner".to_string(),
        FactSchemaEntry::new(FactValueType::Boolean, "Entity has a product owner"),
    );
    store
        .insert_schema(FactSchemaDefinition::new(
            "ownership",
            semver::Version::new(1, 0, 0),
            schema,
        ))
        .await
        .unwrap();

    for (name, owned) in [("one", true), ("two", true), ("three", false)] {
        let mut facts = Map::new();
        facts.insert("hasProductOwner".to_string(), json!(owned));
        store
            .insert_facts(vec![Fact::new(
                "ownership",
                EntityRef::new("component", "default", name),
                facts,
            )])
            .await
            .unwrap();
    }
    store
}

async fn app_with_checks(checks: Vec<Check>, failing: &'static str) -> Router {
    let store = seed_store().await;
    let catalog = Arc::new(BrokenCatalog {
        inner: InMemoryCatalog::with_entities(vec![
            Entity::new("Component", "one"),
            Entity::new("Component", "two"),
            Entity::new("Component", "three"),
        ]),
        failing,
    });

    let checker = FactChecker::builder()
        .fact_store(store.clone())
        .catalog(catalog)
        .checks(checks)
        .build()
        .unwrap();

    let app_state = Arc::new(AppState::new(Arc::new(checker), store).with_concurrency(2));
    create_router(app_state)
}

async fn app() -> Router {
    app_with_checks(vec![owner_check()], "two").await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_list_checks() {
    let app = app().await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/checks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "productOwnerCheck");
    assert_eq!(body[0]["type"], "json-rules-engine");
    assert_eq!(body[0]["factIds"], json!(["ownership"]));
}

#[tokio::test]
async fn test_run_checks_for_entity() {
    let app = app().await;

    let (status, body) = send(&app, post("/checks/run/default/component/one", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let result = &body[0];
    assert_eq!(result["result"], true);
    assert_eq!(result["check"]["metadata"]["level"], "bronze");
    assert!(result["check"]["metadata"].get("hint").is_none());
    assert_eq!(result["facts"]["hasProductOwner"]["value"], true);
    assert_eq!(result["facts"]["hasProductOwner"]["type"], "boolean");
    assert_eq!(
        result["facts"]["hasProductOwner"]["description"],
        "Entity has a product owner"
    );
}

#[tokio::test]
async fn test_failed_check_carries_failure_metadata() {
    let app = app().await;

    let (status, body) = send(
        &app,
        post(
            "/checks/run/default/component/three",
            json!({ "checks": ["productOwnerCheck"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["result"], false);
    assert_eq!(body[0]["check"]["metadata"]["hint"], "Set spec.owner");
}

#[tokio::test]
async fn test_run_checks_without_body() {
    let app = app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/checks/run/default/component/one")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_check_id_is_not_found() {
    let app = app().await;

    let (status, body) = send(
        &app,
        post("/checks/run/default/component/one", json!({ "checks": ["nope"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_unknown_fact_rejects_the_run() {
    let app = app_with_checks(vec![owner_check(), missing_fact_check()], "two").await;

    let (status, body) = send(&app, post("/checks/run/default/component/one", json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().contains("missingFact"));
}

#[tokio::test]
async fn test_bulk_run_isolates_catalog_failures() {
    let app = app().await;

    let (status, body) = send(
        &app,
        post(
            "/checks/run",
            json!({
                "entities": [
                    "component:default/one",
                    { "kind": "component", "name": "two" },
                    "component:three"
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let responses = body.as_array().unwrap();
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["entity"], "component:default/one");
    assert_eq!(responses[0]["results"][0]["result"], true);
    assert!(responses[0].get("error").is_none());

    assert_eq!(responses[1]["entity"], "component:default/two");
    assert_eq!(responses[1]["results"], json!([]));
    assert_eq!(responses[1]["error"]["name"], "CatalogError");

    assert_eq!(responses[2]["results"][0]["result"], false);
}

#[tokio::test]
async fn test_bulk_run_without_filters_matches_single_run() {
    let app = app_with_checks(vec![unfiltered_owner_check()], "two").await;

    let (status, single) =
        send(&app, post("/checks/run/default/component/two", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post("/checks/run", json!({ "entities": ["component:default/two"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body[0].get("error").is_none());
    assert_eq!(body[0]["results"], single);
}

#[tokio::test]
async fn test_bulk_run_over_catalog() {
    let app = app_with_checks(vec![owner_check()], "none").await;

    let (status, body) = send(&app, post("/checks/run", json!({ "entities": [] }))).await;
    assert_eq!(status, StatusCode::OK);

    let entities: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["entity"].as_str().unwrap())
        .collect();
    assert_eq!(
        entities,
        vec!["Component:default/one", "Component:default/three", "Component:default/two"]
    );
}

#[tokio::test]
async fn test_bulk_run_rejects_malformed_refs() {
    let app = app().await;

    let (status, body) = send(&app, post("/checks/run", json!({ "entities": ["no-kind"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_validate_check() {
    let app = app().await;

    let (status, body) = send(&app, post("/checks/validate", json!(owner_check()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = send(&app, post("/checks/validate", json!(missing_fact_check()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["message"].as_str().unwrap().contains("missingFact"));

    let mut bad_grammar = json!(owner_check());
    bad_grammar["rule"]["conditions"] = json!({ "fact": "hasProductOwner", "operator": "equal", "value": true });
    let (status, body) = send(&app, post("/checks/validate", bad_grammar)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(!body["errors"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, post("/checks/validate", json!({ "id": "x" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_validate_check_sees_keys_outside_the_grammar() {
    let app = app().await;
    let leaf = json!({ "fact": "hasProductOwner", "operator": "equal", "value": true });
    let mut with_params = leaf.clone();
    with_params["params"] = json!({});

    for conditions in [json!({ "all": [with_params] }), json!({ "all": [leaf], "any": [] })] {
        let mut check = json!(owner_check());
        check["rule"]["conditions"] = conditions;
        let (status, body) = send(&app, post("/checks/validate", check)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "Failed to validate conditions against JSON schema");
    }
}

#[tokio::test]
async fn test_fact_endpoints() {
    let app = app().await;

    let mut schema = json!({
        "id": "docs",
        "version": "1.0.0",
        "schema": { "hasDocs": { "type": "boolean", "description": "Docs are published" } }
    });
    let (status, _) = send(&app, post("/fact-schemas", schema.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    schema["version"] = json!("1.1.0");
    let (status, _) = send(&app, post("/fact-schemas", schema)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, get("/fact-schemas?ids=docs,ownership")).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<(&str, &str)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| (s["id"].as_str().unwrap(), s["version"].as_str().unwrap()))
        .collect();
    assert!(versions.contains(&("docs", "1.1.0")));
    assert!(versions.contains(&("ownership", "1.0.0")));

    let entity = json!({ "kind": "component", "namespace": "default", "name": "one" });
    let (status, body) = send(
        &app,
        post(
            "/facts",
            json!([
                { "id": "docs", "entity": entity, "timestamp": "2024-01-01T00:00:00Z", "facts": { "hasDocs": false } },
                { "id": "docs", "entity": entity, "timestamp": "2024-02-01T00:00:00Z", "facts": { "hasDocs": true } }
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["inserted"], 2);

    let (status, body) = send(
        &app,
        get("/facts/latest?entity=component:default/one&ids=docs&ids=ownership"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["docs"]["facts"]["hasDocs"], true);
    assert_eq!(body["ownership"]["facts"]["hasProductOwner"], true);

    let (status, body) = send(
        &app,
        get("/facts/range?entity=component:default/one&ids=docs&startDatetime=2023-12-01T00:00:00Z&endDatetime=2024-01-15T00:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["docs"].as_array().unwrap().len(), 1);
    assert_eq!(body["docs"][0]["facts"]["hasDocs"], false);
}

#[tokio::test]
async fn test_fact_queries_validate_parameters() {
    let app = app().await;

    let (status, _) = send(&app, get("/facts/latest?ids=docs")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/facts/latest?entity=one&ids=docs")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        get("/facts/range?entity=component:default/one&ids=docs&startDatetime=soon&endDatetime=later"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_facts_for_unknown_schema_rejected() {
    let app = app().await;

    let (status, _) = send(
        &app,
        post(
            "/facts",
            json!([{
                "id": "unregistered",
                "entity": { "kind": "component", "namespace": "default", "name": "one" },
                "timestamp": "2024-01-01T00:00:00Z",
                "facts": {}
            }]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
