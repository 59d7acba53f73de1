//! Schema definition documents.
//!
//! The registry is built from a YAML document of this shape:
//!
//! ```yaml
//! enums:
//!   ApplicationStatus: [ACTIVE, RETIRED]
//! edges:
//!   DataObjectRelationship:
//!     - { name: name, kind: String, required: true }
//! types:
//!   Application:
//!     fields:
//!       - { name: id, kind: ID, generated: id }
//!       - { name: name, kind: String, required: true }
//!     relationships:
//!       - { name: owner, target: Person, type: OWNED_BY, cardinality: one }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use super::definition::{
    Cardinality, Direction, EdgeSchema, EntityType, EnumType, Field, Generated,
    RelationshipField, ScalarKind,
};
use crate::errors::SchemaError;

#[derive(Debug, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub enums: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub edges: IndexMap<String, Vec<FieldDocument>>,
    #[serde(default)]
    pub types: IndexMap<String, TypeDocument>,
}

#[derive(Debug, Deserialize)]
pub struct TypeDocument {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDocument {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub generated: Option<Generated>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipDocument {
    pub name: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default = "default_cardinality")]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub properties: Option<String>,
}

fn default_direction() -> Direction {
    Direction::Out
}

fn default_cardinality() -> Cardinality {
    Cardinality::Many
}

/// Parsed and validated schema contents, ready to back a registry.
pub struct LoadedSchema {
    pub enums: IndexMap<String, EnumType>,
    pub edges: IndexMap<String, EdgeSchema>,
    pub types: IndexMap<String, EntityType>,
}

pub fn parse_document(source: &str) -> Result<SchemaDocument, SchemaError> {
    Ok(serde_yaml::from_str(source)?)
}

pub fn load(document: SchemaDocument) -> Result<LoadedSchema, SchemaError> {
    let enums: IndexMap<String, EnumType> = document
        .enums
        .into_iter()
        .map(|(name, values)| {
            let enum_type = EnumType {
                name: name.clone(),
                values,
            };
            (name, enum_type)
        })
        .collect();

    for enum_type in enums.values() {
        if enum_type.values.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "enum {} declares no values",
                enum_type.name
            )));
        }
    }

    let mut edges = IndexMap::new();
    for (name, fields) in document.edges {
        let fields = resolve_fields(&name, fields, &enums)?;
        if fields.iter().any(|f| f.generated == Some(Generated::Id)) {
            return Err(SchemaError::Invalid(format!(
                "edge properties {} cannot declare a generated id",
                name
            )));
        }
        edges.insert(name.clone(), EdgeSchema { name, fields });
    }

    let mut types = IndexMap::new();
    for (name, doc) in &document.types {
        let fields = resolve_fields(name, doc.fields.clone(), &enums)?;
        let has_id = fields
            .iter()
            .any(|f| f.name == "id" && f.kind == ScalarKind::Id && !f.list);
        if !has_id {
            return Err(SchemaError::MissingId(name.clone()));
        }

        let mut relationships = Vec::with_capacity(doc.relationships.len());
        for rel in &doc.relationships {
            if !document.types.contains_key(&rel.target) {
                return Err(SchemaError::UnknownTarget {
                    entity: name.clone(),
                    field: rel.name.clone(),
                    target: rel.target.clone(),
                });
            }
            if let Some(properties) = &rel.properties {
                if !edges.contains_key(properties) {
                    return Err(SchemaError::UnknownEdgeSchema {
                        entity: name.clone(),
                        field: rel.name.clone(),
                        properties: properties.clone(),
                    });
                }
            }
            relationships.push(RelationshipField {
                name: rel.name.clone(),
                target: rel.target.clone(),
                rel_type: rel.rel_type.clone(),
                direction: rel.direction,
                cardinality: rel.cardinality,
                properties: rel.properties.clone(),
            });
        }

        check_unique_names(name, &fields, &relationships)?;

        types.insert(
            name.clone(),
            EntityType {
                name: name.clone(),
                description: doc.description.clone(),
                fields,
                relationships,
            },
        );
    }

    Ok(LoadedSchema {
        enums,
        edges,
        types,
    })
}

fn resolve_fields(
    owner: &str,
    docs: Vec<FieldDocument>,
    enums: &IndexMap<String, EnumType>,
) -> Result<Vec<Field>, SchemaError> {
    docs.into_iter()
        .map(|doc| {
            let kind = match ScalarKind::builtin(&doc.kind) {
                Some(kind) => kind,
                None if enums.contains_key(&doc.kind) => ScalarKind::Enum(doc.kind.clone()),
                None => {
                    return Err(SchemaError::UnknownKind {
                        entity: owner.to_string(),
                        field: doc.name,
                        kind: doc.kind,
                    })
                }
            };
            let nullable = !doc.required && doc.generated.is_none();
            Ok(Field {
                name: doc.name,
                kind,
                nullable,
                list: doc.list,
                generated: doc.generated,
            })
        })
        .collect()
}

fn check_unique_names(
    entity: &str,
    fields: &[Field],
    relationships: &[RelationshipField],
) -> Result<(), SchemaError> {
    let mut seen = std::collections::HashSet::new();
    let derived = relationships
        .iter()
        .flat_map(|r| [r.connection_name(), r.aggregate_name()]);
    let names = fields
        .iter()
        .map(|f| f.name.clone())
        .chain(relationships.iter().map(|r| r.name.clone()))
        .chain(derived);

    for name in names {
        if !seen.insert(name.clone()) {
            return Err(SchemaError::Duplicate {
                entity: entity.to_string(),
                name,
            });
        }
    }
    Ok(())
}
