//! The process-wide schema registry.
//!
//! Loaded once at startup and shared immutably (behind an `Arc`) by every
//! request. All validation and dispatch in the filter compiler, sort engine,
//! aggregation engine and mutation planner goes through these lookups.

use std::path::Path;

use indexmap::IndexMap;
use tracing::info;

use super::definition::{
    Direction, EdgeSchema, EntityType, EnumType, RelationshipField,
};
use super::loader;
use crate::errors::{EngineError, EngineResult, SchemaError};

const ENTERPRISE_ARCHITECTURE_SCHEMA: &str = include_str!("eam.yaml");

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: IndexMap<String, EntityType>,
    enums: IndexMap<String, EnumType>,
    edges: IndexMap<String, EdgeSchema>,
}

/// A "one" relationship field that constrains an edge being created.
#[derive(Debug, Clone, Copy)]
pub struct SingularSide<'a> {
    pub owner: &'a EntityType,
    pub field: &'a RelationshipField,
}

impl SchemaRegistry {
    pub fn from_yaml(source: &str) -> Result<Self, SchemaError> {
        let loaded = loader::load(loader::parse_document(source)?)?;
        let registry = Self {
            types: loaded.types,
            enums: loaded.enums,
            edges: loaded.edges,
        };
        info!(
            "Schema registry loaded: {} types, {} enums, {} edge schemas",
            registry.types.len(),
            registry.enums.len(),
            registry.edges.len()
        );
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// The embedded Enterprise Architecture Management schema.
    pub fn enterprise_architecture() -> Result<Self, SchemaError> {
        Self::from_yaml(ENTERPRISE_ARCHITECTURE_SCHEMA)
    }

    /// Resolve an entity type, failing the request when it is unknown.
    pub fn entity(&self, name: &str) -> EngineResult<&EntityType> {
        self.types
            .get(name)
            .ok_or_else(|| EngineError::entity_validation(name, format!("unknown type '{}'", name)))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    /// Edge schema of a rich relationship, `None` for plain ones.
    pub fn edge_schema_for(&self, rel: &RelationshipField) -> Option<&EdgeSchema> {
        rel.properties.as_deref().and_then(|name| self.edges.get(name))
    }

    /// Resolve a relationship field, failing the request when it is unknown.
    pub fn relationship<'a>(
        &'a self,
        entity: &'a EntityType,
        name: &str,
    ) -> EngineResult<&'a RelationshipField> {
        entity.relationship(name).ok_or_else(|| {
            EngineError::field_validation(&entity.name, name, format!(
                "unknown relationship '{}' on {}",
                name, entity.name
            ))
        })
    }

    /// All "one" relationship fields, on either endpoint, that an edge of
    /// `rel_type` from a `source` node to a `target` node would populate.
    pub fn singular_sides(
        &self,
        rel_type: &str,
        source: &str,
        target: &str,
    ) -> Vec<SingularSide<'_>> {
        let mut sides = Vec::new();
        for owner in self.types.values() {
            for field in &owner.relationships {
                if field.is_many() || field.rel_type != rel_type {
                    continue;
                }
                let constrains = match field.direction {
                    Direction::Out => owner.name == source && field.target == target,
                    Direction::In => owner.name == target && field.target == source,
                };
                if constrains {
                    sides.push(SingularSide { owner, field });
                }
            }
        }
        sides
    }
}
