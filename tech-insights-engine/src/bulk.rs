//! Running checks across many entities with bounded concurrency

use std::sync::Arc;
use tech_insights_core::{BulkCheckResponse, CheckResult, Entity, EntityRef, SerializedError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::{EngineError, FactChecker};

enum Target {
    Ref(EntityRef),
    Entity(Entity),
}

impl Target {
    fn entity_ref(&self) -> EntityRef {
        match self {
            Target::Ref(entity_ref) => entity_ref.clone(),
            Target::Entity(entity) => entity.entity_ref(),
        }
    }
}

/// Run checks for every entity, at most `concurrency` at a time.
///
/// An empty `entities` list means every entity in the catalog. Listed entities
/// are looked up in the catalog only when a selected check has a filter, and a
/// failed lookup is reported for that entity instead of running unfiltered.
/// Failures are captured per entity; only listing the catalog can fail the
/// whole call. Responses are returned in input order.
pub async fn run_bulk(
    checker: Arc<FactChecker>,
    entities: Vec<EntityRef>,
    check_ids: Option<Vec<String>>,
    concurrency: usize,
) -> Result<Vec<BulkCheckResponse>, EngineError> {
    let targets: Vec<Target> = if entities.is_empty() {
        checker
            .list_entities()
            .await?
            .into_iter()
            .map(Target::Entity)
            .collect()
    } else {
        entities.into_iter().map(Target::Ref).collect()
    };

    let refs: Vec<String> = targets.iter().map(|t| t.entity_ref().to_string()).collect();
    // Unknown check ids are reported per entity by the run itself
    let resolve = checker.has_catalog()
        && matches!(
            checker.has_filtered_checks(check_ids.as_deref()).await,
            Ok(true)
        );
    let check_ids = check_ids.map(Arc::new);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, target) in targets.into_iter().enumerate() {
        let checker = checker.clone();
        let check_ids = check_ids.clone();
        let sem = semaphore.clone();
        set.spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return (idx, Err(EngineError::Configuration("Limiter closed".to_string())));
            };
            let check_ids = check_ids.as_deref().map(Vec::as_slice);
            let outcome = run_target(&checker, target, check_ids, resolve).await;
            (idx, outcome)
        });
    }

    let mut responses: Vec<Option<BulkCheckResponse>> = refs.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => {
                responses[idx] = Some(to_response(refs[idx].clone(), outcome));
            }
            Err(e) => tracing::error!("Check run task failed: {}", e),
        }
    }

    Ok(responses
        .into_iter()
        .zip(refs)
        .map(|(response, entity)| {
            response.unwrap_or_else(|| BulkCheckResponse {
                entity,
                results: Vec::new(),
                error: Some(SerializedError {
                    name: "Error".to_string(),
                    message: "Check run did not complete".to_string(),
                }),
            })
        })
        .collect())
}

async fn run_target(
    checker: &FactChecker,
    target: Target,
    check_ids: Option<&[String]>,
    resolve: bool,
) -> Result<Vec<CheckResult>, EngineError> {
    match target {
        Target::Entity(entity) => checker.run_checks_for_entity(&entity, check_ids).await,
        Target::Ref(entity_ref) if resolve => {
            let entity = checker.resolve_entity(&entity_ref).await?;
            checker.run_checks_for_entity(&entity, check_ids).await
        }
        Target::Ref(entity_ref) => checker.run_checks(&entity_ref, check_ids).await,
    }
}

fn to_response(
    entity: String,
    outcome: Result<Vec<CheckResult>, EngineError>,
) -> BulkCheckResponse {
    match outcome {
        Ok(results) => BulkCheckResponse {
            entity,
            results,
            error: None,
        },
        Err(e) => {
            tracing::error!("{}: {}", e.name(), e);
            BulkCheckResponse {
                entity,
                results: Vec::new(),
                error: Some(SerializedError {
                    name: e.name().to_string(),
                    message: e.to_string(),
                }),
            }
        }
    }
}
