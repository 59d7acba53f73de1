//! Error types for the archgraph engine
//!
//! Errors are split by the layer that raises them, so callers can tell a bad
//! request from a broken store without string matching.
//!
//! # Error Categories
//!
//! - **SchemaError**: loading or validating a schema definition at startup
//! - **StoreError**: failures inside a graph store adapter
//! - **EngineError**: everything a query or mutation request can surface
//!
//! # Examples
//!
//! ```rust
//! use archgraph::errors::EngineError;
//!
//! let err = EngineError::schema_validation("unknown field 'colour' on Application");
//! assert_eq!(err.error_code(), "SCHEMA_VALIDATION");
//! assert!(err.is_client_error());
//! ```

pub mod common;
pub mod engine;
pub mod schema;
pub mod store;

pub use engine::{EngineError, ValidationFailure};
pub use schema::SchemaError;
pub use store::StoreError;

#[cfg(feature = "graphql")]
pub use common::ToGraphQLError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for store adapter operations
pub type StoreResult<T> = Result<T, StoreError>;
