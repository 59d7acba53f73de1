//! Graph store over sea-orm.
//!
//! Nodes and edges live in the `graph_nodes` and `graph_edges` tables with
//! their properties as JSON. Each engine transaction maps onto one database
//! transaction.

use async_trait::async_trait;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::Value;

use super::{EdgeRecord, GraphCounts, GraphStore, GraphTransaction, NodeRecord};
use crate::database::entities::{graph_edges, graph_nodes};
use crate::errors::{StoreError, StoreResult};
use crate::schema::Direction;
use crate::value::Properties;

#[derive(Clone)]
pub struct SeaOrmGraphStore {
    db: DatabaseConnection,
}

impl SeaOrmGraphStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GraphStore for SeaOrmGraphStore {
    fn backend_name(&self) -> &'static str {
        "sea-orm"
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SeaOrmTransaction {
            txn,
            read_only: true,
        }))
    }

    async fn begin_write(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SeaOrmTransaction {
            txn,
            read_only: false,
        }))
    }

    async fn counts(&self) -> StoreResult<GraphCounts> {
        let nodes = graph_nodes::Entity::find().count(&self.db).await?;
        let edges = graph_edges::Entity::find().count(&self.db).await?;
        Ok(GraphCounts { nodes, edges })
    }
}

pub struct SeaOrmTransaction {
    txn: DatabaseTransaction,
    read_only: bool,
}

impl SeaOrmTransaction {
    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

fn properties_of(value: Value) -> StoreResult<Properties> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Properties::new()),
        other => Err(StoreError::Serialization(serde::de::Error::custom(format!(
            "stored properties are not an object: {}",
            other
        )))),
    }
}

fn node_from_model(model: graph_nodes::Model) -> StoreResult<NodeRecord> {
    Ok(NodeRecord {
        id: model.id,
        label: model.label,
        properties: properties_of(model.properties)?,
    })
}

fn edge_from_model(model: graph_edges::Model) -> StoreResult<EdgeRecord> {
    Ok(EdgeRecord {
        id: model.id,
        rel_type: model.rel_type,
        source: model.source_id,
        target: model.target_id,
        properties: properties_of(model.properties)?,
    })
}

#[async_trait]
impl GraphTransaction for SeaOrmTransaction {
    async fn node(&self, id: &str) -> StoreResult<Option<NodeRecord>> {
        graph_nodes::Entity::find_by_id(id.to_string())
            .one(&self.txn)
            .await?
            .map(node_from_model)
            .transpose()
    }

    async fn nodes_by_label(&self, label: &str) -> StoreResult<Vec<NodeRecord>> {
        graph_nodes::Entity::find()
            .filter(graph_nodes::Column::Label.eq(label))
            .order_by_asc(graph_nodes::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(node_from_model)
            .collect()
    }

    async fn edges(
        &self,
        node_id: &str,
        rel_type: &str,
        direction: Direction,
    ) -> StoreResult<Vec<EdgeRecord>> {
        let endpoint = match direction {
            Direction::Out => graph_edges::Column::SourceId,
            Direction::In => graph_edges::Column::TargetId,
        };
        graph_edges::Entity::find()
            .filter(graph_edges::Column::RelType.eq(rel_type))
            .filter(endpoint.eq(node_id))
            .order_by_asc(graph_edges::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(edge_from_model)
            .collect()
    }

    async fn edges_touching(&self, node_id: &str) -> StoreResult<Vec<EdgeRecord>> {
        graph_edges::Entity::find()
            .filter(
                Condition::any()
                    .add(graph_edges::Column::SourceId.eq(node_id))
                    .add(graph_edges::Column::TargetId.eq(node_id)),
            )
            .order_by_asc(graph_edges::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(edge_from_model)
            .collect()
    }

    async fn insert_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        if self.node(&node.id).await?.is_some() {
            return Err(StoreError::Constraint(format!(
                "node '{}' already exists",
                node.id
            )));
        }
        let model = graph_nodes::ActiveModel {
            id: Set(node.id),
            label: Set(node.label),
            properties: Set(Value::Object(node.properties)),
        };
        graph_nodes::Entity::insert(model)
            .exec_without_returning(&self.txn)
            .await?;
        Ok(())
    }

    async fn update_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let result = graph_nodes::Entity::update_many()
            .col_expr(
                graph_nodes::Column::Properties,
                Expr::value(Value::Object(node.properties)),
            )
            .filter(graph_nodes::Column::Id.eq(node.id.as_str()))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NodeNotFound(node.id));
        }
        Ok(())
    }

    async fn delete_node(&mut self, id: &str) -> StoreResult<()> {
        self.ensure_writable()?;
        let attached = graph_edges::Entity::find()
            .filter(
                Condition::any()
                    .add(graph_edges::Column::SourceId.eq(id))
                    .add(graph_edges::Column::TargetId.eq(id)),
            )
            .count(&self.txn)
            .await?;
        if attached > 0 {
            return Err(StoreError::Constraint(format!(
                "node '{}' still has {} edges",
                id, attached
            )));
        }
        let result = graph_nodes::Entity::delete_by_id(id.to_string())
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NodeNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn insert_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        for endpoint in [&edge.source, &edge.target] {
            if self.node(endpoint).await?.is_none() {
                return Err(StoreError::NodeNotFound(endpoint.clone()));
            }
        }
        let model = graph_edges::ActiveModel {
            id: Set(edge.id),
            rel_type: Set(edge.rel_type),
            source_id: Set(edge.source),
            target_id: Set(edge.target),
            properties: Set(Value::Object(edge.properties)),
        };
        graph_edges::Entity::insert(model)
            .exec_without_returning(&self.txn)
            .await?;
        Ok(())
    }

    async fn update_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let result = graph_edges::Entity::update_many()
            .col_expr(
                graph_edges::Column::Properties,
                Expr::value(Value::Object(edge.properties)),
            )
            .filter(graph_edges::Column::Id.eq(edge.id.as_str()))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::EdgeNotFound(edge.id));
        }
        Ok(())
    }

    async fn delete_edge(&mut self, id: &str) -> StoreResult<()> {
        self.ensure_writable()?;
        let result = graph_edges::Entity::delete_by_id(id.to_string())
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::EdgeNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
