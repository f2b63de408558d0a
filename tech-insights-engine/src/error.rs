//! Engine error types

use tech_insights_core::CoreError;
use tech_insights_storage::StorageError;
use tech_insights_validator::ValidatorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Check {check_id} is invalid: {message}")]
    InvalidCheck { check_id: String, message: String },

    #[error("Check {check_id} references facts missing from its fact schemas: {}", facts.join(", "))]
    UnknownFacts { check_id: String, facts: Vec<String> },

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Undefined fact '{0}'")]
    UndefinedFact(String),

    #[error("Failed to fetch entity {entity} from the catalog: {message}")]
    Catalog { entity: String, message: String },

    #[error("Entity {0} not found in the catalog")]
    EntityNotFound(String),
}

impl EngineError {
    /// Stable error name used when errors are reported per entity
    pub fn name(&self) -> &'static str {
        match self {
            EngineError::Storage(StorageError::NotFound(_)) | EngineError::EntityNotFound(_) => {
                "NotFoundError"
            }
            EngineError::Storage(_) => "StorageError",
            EngineError::Core(_) => "InputError",
            EngineError::Validator(_)
            | EngineError::Configuration(_)
            | EngineError::InvalidCheck { .. }
            | EngineError::UnknownFacts { .. }
            | EngineError::UnknownOperator(_) => "ConfigurationError",
            EngineError::UndefinedFact(_) => "UndefinedFactError",
            EngineError::Catalog { .. } => "CatalogError",
        }
    }
}
