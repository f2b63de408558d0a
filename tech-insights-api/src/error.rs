//! API error types and error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tech_insights_core::CoreError;
use tech_insights_engine::EngineError;
use tech_insights_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Evaluation(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ApiError::NotFound(msg),
            StorageError::AlreadyExists(msg) => ApiError::BadRequest(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Storage(e) => e.into(),
            EngineError::Core(e) => e.into(),
            EngineError::EntityNotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Evaluation(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Evaluation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "evaluation_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Errors raised while loading configuration and preparing the server
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cannot load {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("Failed to seed stores: {0}")]
    Seed(#[from] StorageError),

    #[error("Failed to build the fact checker: {0}")]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let not_found: ApiError =
            EngineError::Storage(StorageError::NotFound("Check with id x not found".into())).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let bad_ref: ApiError = EngineError::Core(CoreError::InvalidEntityRef("x".into())).into();
        assert_eq!(bad_ref.into_response().status(), StatusCode::BAD_REQUEST);

        let unknown: ApiError = EngineError::UnknownFacts {
            check_id: "c".into(),
            facts: vec!["missingFact".into()],
        }
        .into();
        assert_eq!(unknown.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
