use async_graphql::*;
use serde_json::Value;

use crate::mutation::MutationInfo;
use crate::query::pagination;
use crate::query::{executor, AggregateResult};
use crate::schema::{EntityType, EnumType, Field, RelationshipField};

#[derive(SimpleObject, Clone, Debug)]
pub struct PageInfo {
    #[graphql(name = "hasNextPage")]
    pub has_next_page: bool,
    #[graphql(name = "hasPreviousPage")]
    pub has_previous_page: bool,
    #[graphql(name = "startCursor")]
    pub start_cursor: Option<String>,
    #[graphql(name = "endCursor")]
    pub end_cursor: Option<String>,
}

impl From<pagination::PageInfo> for PageInfo {
    fn from(info: pagination::PageInfo) -> Self {
        Self {
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
            start_cursor: info.start_cursor,
            end_cursor: info.end_cursor,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct ConnectionEdge {
    pub cursor: String,
    pub node: Value,
    /// Edge properties of rich relationships
    pub properties: Option<Value>,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Connection {
    pub edges: Vec<ConnectionEdge>,
    #[graphql(name = "pageInfo")]
    pub page_info: PageInfo,
    #[graphql(name = "totalCount")]
    pub total_count: i64,
}

impl From<executor::Connection> for Connection {
    fn from(connection: executor::Connection) -> Self {
        Self {
            edges: connection
                .edges
                .into_iter()
                .map(|edge| ConnectionEdge {
                    cursor: edge.cursor,
                    node: edge.node,
                    properties: edge.properties,
                })
                .collect(),
            page_info: connection.page_info.into(),
            total_count: connection.total_count as i64,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Aggregate {
    pub count: i64,
    /// Per-field summaries over the related or matched nodes
    pub node: Value,
    /// Per-field summaries over edge properties, on rich relationships
    pub edge: Option<Value>,
}

impl From<AggregateResult> for Aggregate {
    fn from(result: AggregateResult) -> Self {
        Self {
            count: result.count as i64,
            node: Value::Object(result.node),
            edge: result.edge.map(Value::Object),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct CreateInfo {
    #[graphql(name = "nodesCreated")]
    pub nodes_created: i64,
    #[graphql(name = "relationshipsCreated")]
    pub relationships_created: i64,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct UpdateInfo {
    #[graphql(name = "nodesCreated")]
    pub nodes_created: i64,
    #[graphql(name = "nodesDeleted")]
    pub nodes_deleted: i64,
    #[graphql(name = "relationshipsCreated")]
    pub relationships_created: i64,
    #[graphql(name = "relationshipsDeleted")]
    pub relationships_deleted: i64,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct DeleteInfo {
    #[graphql(name = "nodesDeleted")]
    pub nodes_deleted: i64,
    #[graphql(name = "relationshipsDeleted")]
    pub relationships_deleted: i64,
}

impl From<MutationInfo> for CreateInfo {
    fn from(info: MutationInfo) -> Self {
        Self {
            nodes_created: info.nodes_created as i64,
            relationships_created: info.relationships_created as i64,
        }
    }
}

impl From<MutationInfo> for UpdateInfo {
    fn from(info: MutationInfo) -> Self {
        Self {
            nodes_created: info.nodes_created as i64,
            nodes_deleted: info.nodes_deleted as i64,
            relationships_created: info.relationships_created as i64,
            relationships_deleted: info.relationships_deleted as i64,
        }
    }
}

impl From<MutationInfo> for DeleteInfo {
    fn from(info: MutationInfo) -> Self {
        Self {
            nodes_deleted: info.nodes_deleted as i64,
            relationships_deleted: info.relationships_deleted as i64,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct CreateResponse {
    pub info: CreateInfo,
    pub entities: Vec<Value>,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct UpdateResponse {
    pub info: UpdateInfo,
    pub entities: Vec<Value>,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub kind: String,
    pub nullable: bool,
    pub list: bool,
    pub generated: bool,
}

impl From<&Field> for FieldInfo {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            kind: field.kind.graphql_name().to_string(),
            nullable: field.nullable,
            list: field.list,
            generated: field.generated.is_some(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct RelationshipInfo {
    pub name: String,
    pub target: String,
    #[graphql(name = "relType")]
    pub rel_type: String,
    pub direction: String,
    pub many: bool,
    /// Edge schema name of a rich relationship
    pub properties: Option<String>,
}

impl From<&RelationshipField> for RelationshipInfo {
    fn from(rel: &RelationshipField) -> Self {
        Self {
            name: rel.name.clone(),
            target: rel.target.clone(),
            rel_type: rel.rel_type.clone(),
            direction: format!("{:?}", rel.direction).to_uppercase(),
            many: rel.is_many(),
            properties: rel.properties.clone(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct EntityTypeInfo {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub relationships: Vec<RelationshipInfo>,
}

impl From<&EntityType> for EntityTypeInfo {
    fn from(entity: &EntityType) -> Self {
        Self {
            name: entity.name.clone(),
            description: entity.description.clone(),
            fields: entity.fields.iter().map(FieldInfo::from).collect(),
            relationships: entity.relationships.iter().map(RelationshipInfo::from).collect(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct EnumInfo {
    pub name: String,
    pub values: Vec<String>,
}

impl From<&EnumType> for EnumInfo {
    fn from(enum_type: &EnumType) -> Self {
        Self {
            name: enum_type.name.clone(),
            values: enum_type.values.clone(),
        }
    }
}
