//! Request-level error taxonomy
//!
//! Every query or mutation request either succeeds or fails with exactly one
//! of these kinds. Validation kinds are raised before the store is touched;
//! the others abort the surrounding transaction.

use std::fmt;

use thiserror::Error;

use super::StoreError;

/// A schema validation failure and the entity and field it concerns, when
/// there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub message: String,
    pub entity: Option<String>,
    pub field: Option<String>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors surfaced by query and mutation requests
#[derive(Error, Debug)]
pub enum EngineError {
    /// The request references an unknown type, field or relationship, or a
    /// value does not fit the schema
    #[error("Schema validation failed: {0}")]
    SchemaValidation(ValidationFailure),

    /// The mutation would violate a relationship cardinality
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A `where` clause matched nothing where a match was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value operation failed while applying a mutation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The request was cancelled before its transaction committed
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// The underlying graph store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn schema_validation(message: impl Into<String>) -> Self {
        EngineError::SchemaValidation(ValidationFailure {
            message: message.into(),
            entity: None,
            field: None,
        })
    }

    /// Validation failure on a whole entity type.
    pub fn entity_validation(entity: &str, message: impl Into<String>) -> Self {
        EngineError::SchemaValidation(ValidationFailure {
            message: message.into(),
            entity: Some(entity.to_string()),
            field: None,
        })
    }

    /// Validation failure on one field or relationship of an entity type.
    pub fn field_validation(entity: &str, field: &str, message: impl Into<String>) -> Self {
        EngineError::SchemaValidation(ValidationFailure {
            message: message.into(),
            entity: Some(entity.to_string()),
            field: Some(field.to_string()),
        })
    }

    /// The validation failure behind this error, if it is one
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            EngineError::SchemaValidation(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EngineError::NotFound(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        EngineError::InvalidOperation(message.into())
    }

    /// Check if this error was caused by the request rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::SchemaValidation(_)
                | EngineError::Conflict(_)
                | EngineError::NotFound(_)
                | EngineError::InvalidOperation(_)
        )
    }

    /// Check if this error is raised before any store access
    pub fn is_validation_error(&self) -> bool {
        matches!(self, EngineError::SchemaValidation(_))
    }

    /// Get error code for GraphQL/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::SchemaValidation(_) => "SCHEMA_VALIDATION",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::InvalidOperation(_) => "INVALID_OPERATION",
            EngineError::Cancelled(_) => "CANCELLED",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }
}
