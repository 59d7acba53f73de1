use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A directed, typed relationship between two graph nodes
///
/// Related entities:
/// - `graph_nodes`: both endpoints, by node id
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "graph_edges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub rel_type: String,
    pub source_id: String,
    pub target_id: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: serde_json::Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::graph_nodes::Entity",
        from = "Column::SourceId",
        to = "super::graph_nodes::Column::Id"
    )]
    Source,
    #[sea_orm(
        belongs_to = "super::graph_nodes::Entity",
        from = "Column::TargetId",
        to = "super::graph_nodes::Column::Id"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
