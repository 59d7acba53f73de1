//! Schema registry: entity types, fields, relationships and edge schemas.
//!
//! This is the single source of truth the generic engine consults at request
//! time. Per-entity filter, sort, aggregate and mutation input shapes are not
//! generated as types; they are interpreted against this metadata.

pub mod definition;
pub mod loader;
pub mod registry;

pub use definition::{
    Cardinality, Direction, EdgeSchema, EntityType, EnumType, Field, Generated,
    RelationshipField, ScalarKind,
};
pub use registry::{SchemaRegistry, SingularSide};
