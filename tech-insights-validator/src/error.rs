//! Validator error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Invalid rule schema: {0}")]
    InvalidSchema(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
