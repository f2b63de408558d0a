//! Validation of check definitions
//!
//! Checks the condition grammar of a rule against a JSON schema (built from the
//! operator names the engine knows), the check type, and that every fact a
//! rule reads is declared by one of the check's fact schemas.

pub mod error;
pub mod schema;
pub mod validator;

pub use error::ValidatorError;
pub use schema::rule_schema;
pub use validator::CheckValidator;
