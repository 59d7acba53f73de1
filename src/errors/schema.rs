//! Schema definition loading errors

use thiserror::Error;

/// Errors raised while loading or validating a schema definition
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The definition document could not be parsed
    #[error("Invalid schema document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The definition file could not be read
    #[error("Failed to read schema file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A field kind names neither a scalar nor a declared enum
    #[error("Unknown field kind '{kind}' on {entity}.{field}")]
    UnknownKind {
        entity: String,
        field: String,
        kind: String,
    },

    /// A relationship targets an undeclared type
    #[error("Relationship {entity}.{field} targets unknown type '{target}'")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    /// A relationship references an undeclared edge schema
    #[error("Relationship {entity}.{field} references unknown edge properties '{properties}'")]
    UnknownEdgeSchema {
        entity: String,
        field: String,
        properties: String,
    },

    /// A name is declared twice within one type
    #[error("Duplicate name '{name}' on {entity}")]
    Duplicate { entity: String, name: String },

    /// Every entity type needs an `id: ID` field
    #[error("Type {0} has no 'id' field of kind ID")]
    MissingId(String),

    /// Structural problem not covered above
    #[error("Invalid schema: {0}")]
    Invalid(String),
}
