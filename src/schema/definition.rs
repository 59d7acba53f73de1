//! Core schema definition types.
//!
//! Provides the metadata table the generic engine consults at request time:
//! entity types, their scalar fields, relationship fields and the edge
//! property schemas of rich relationships.

use serde::{Deserialize, Serialize};

/// The kind of a scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
    Date,
    DateTime,
    /// A domain enum, by name. Values are checked against the registry.
    Enum(String),
}

impl ScalarKind {
    /// Parse a built-in scalar name. Enum kinds are resolved by the loader.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "ID" => Some(ScalarKind::Id),
            "String" => Some(ScalarKind::String),
            "Int" => Some(ScalarKind::Int),
            "Float" => Some(ScalarKind::Float),
            "Boolean" => Some(ScalarKind::Boolean),
            "Date" => Some(ScalarKind::Date),
            "DateTime" => Some(ScalarKind::DateTime),
            _ => None,
        }
    }

    /// Returns the GraphQL type name for this kind.
    pub fn graphql_name(&self) -> &str {
        match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Date => "Date",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::Enum(name) => name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ScalarKind::Date | ScalarKind::DateTime)
    }

    /// Kinds that support `gt/gte/lt/lte`.
    pub fn is_ordered(&self) -> bool {
        self.is_numeric() || self.is_textual() || self.is_temporal()
    }
}

/// Values the engine assigns itself; never accepted from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Generated {
    Id,
    CreatedAt,
    UpdatedAt,
}

/// A scalar field on an entity type or edge schema.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub list: bool,
    pub generated: Option<Generated>,
}

impl Field {
    /// Required on create: non-nullable and not engine-assigned.
    pub fn is_required_input(&self) -> bool {
        !self.nullable && self.generated.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }
}

/// Property list of a rich relationship.
#[derive(Debug, Clone)]
pub struct EdgeSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl EdgeSchema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that must be supplied on `connect`/`create`.
    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_required_input())
    }
}

/// A relationship field on an entity type.
#[derive(Debug, Clone)]
pub struct RelationshipField {
    pub name: String,
    pub target: String,
    pub rel_type: String,
    pub direction: Direction,
    pub cardinality: Cardinality,
    /// Name of the EdgeSchema when the relationship carries properties.
    pub properties: Option<String>,
}

impl RelationshipField {
    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    pub fn is_rich(&self) -> bool {
        self.properties.is_some()
    }

    pub fn connection_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    pub fn aggregate_name(&self) -> String {
        format!("{}Aggregate", self.name)
    }
}

/// An entity type: a node label with its fields and relationships.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub relationships: Vec<RelationshipField>,
}

impl EntityType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Resolve `<rel>Connection`.
    pub fn connection_field(&self, name: &str) -> Option<&RelationshipField> {
        name.strip_suffix("Connection")
            .and_then(|base| self.relationship(base))
    }

    /// Resolve `<rel>Aggregate`.
    pub fn aggregate_field(&self, name: &str) -> Option<&RelationshipField> {
        name.strip_suffix("Aggregate")
            .and_then(|base| self.relationship(base))
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_required_input())
    }

    pub fn generated_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.generated.is_some())
    }
}

/// A domain enum and its value set.
#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}
