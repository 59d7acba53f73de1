use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A node of the property graph
///
/// `label` is the entity type name. Scalar fields, including `id`, live in
/// the `properties` JSON object.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "graph_nodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub label: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: serde_json::Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
