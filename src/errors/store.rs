//! Graph store adapter errors

use thiserror::Error;

/// Failures raised by a `GraphStore` implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Stored properties could not be (de)serialized
    #[error("Property serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Node not found by identifier
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// Edge not found by identifier
    #[error("Edge '{0}' not found")]
    EdgeNotFound(String),

    /// A store-level constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A write was attempted through a read transaction
    #[error("Transaction is read-only")]
    ReadOnly,
}
