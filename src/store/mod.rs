//! Graph store adapter seam.
//!
//! The engine talks to the underlying graph database only through
//! [`GraphStore`] and the [`GraphTransaction`] it hands out. Every request
//! runs inside exactly one transaction: queries in a read transaction,
//! mutations in a write transaction that is committed once all planned
//! operations were applied. Dropping a transaction without committing it
//! rolls it back.

pub mod memory;
pub mod sea_orm_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::schema::{Direction, RelationshipField};
use crate::value::Properties;

pub use memory::MemoryGraphStore;
pub use sea_orm_store::SeaOrmGraphStore;

/// A stored node. `label` is the entity type name; `properties` holds every
/// scalar field including `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    pub properties: Properties,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>, mut properties: Properties) -> Self {
        let id = id.into();
        properties.insert("id".to_string(), serde_json::Value::String(id.clone()));
        Self {
            id,
            label: label.into(),
            properties,
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.properties.get(field)
    }
}

/// A stored relationship, always directed from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub rel_type: String,
    pub source: String,
    pub target: String,
    pub properties: Properties,
}

impl EdgeRecord {
    /// The endpoint opposite `node_id`.
    pub fn other_end(&self, node_id: &str) -> &str {
        if self.source == node_id {
            &self.target
        } else {
            &self.source
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.properties.get(field)
    }
}

/// Node and edge totals, used to verify rollbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: u64,
    pub edges: u64,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short name for logs.
    fn backend_name(&self) -> &'static str;

    /// Start a transaction that only reads. Writes through it fail with
    /// `StoreError::ReadOnly`.
    async fn begin_read(&self) -> StoreResult<Box<dyn GraphTransaction>>;

    async fn begin_write(&self) -> StoreResult<Box<dyn GraphTransaction>>;

    /// Committed node and edge totals.
    async fn counts(&self) -> StoreResult<GraphCounts>;
}

#[async_trait]
pub trait GraphTransaction: Send + Sync {
    async fn node(&self, id: &str) -> StoreResult<Option<NodeRecord>>;

    /// All nodes with the label, ordered by id.
    async fn nodes_by_label(&self, label: &str) -> StoreResult<Vec<NodeRecord>>;

    /// Edges of `rel_type` leaving (`Out`) or entering (`In`) the node,
    /// ordered by edge id.
    async fn edges(
        &self,
        node_id: &str,
        rel_type: &str,
        direction: Direction,
    ) -> StoreResult<Vec<EdgeRecord>>;

    /// Every edge with the node at either end, ordered by edge id.
    async fn edges_touching(&self, node_id: &str) -> StoreResult<Vec<EdgeRecord>>;

    async fn insert_node(&mut self, node: NodeRecord) -> StoreResult<()>;

    /// Replace the properties of an existing node.
    async fn update_node(&mut self, node: NodeRecord) -> StoreResult<()>;

    /// Remove a node. Fails with a constraint error while edges still touch it.
    async fn delete_node(&mut self, id: &str) -> StoreResult<()>;

    /// Insert an edge. Both endpoints must exist.
    async fn insert_edge(&mut self, edge: EdgeRecord) -> StoreResult<()>;

    /// Replace the properties of an existing edge.
    async fn update_edge(&mut self, edge: EdgeRecord) -> StoreResult<()>;

    async fn delete_edge(&mut self, id: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Edge/node pairs reachable from a node through a relationship field.
///
/// Only neighbours whose label is the relationship's target type are
/// returned, since several types may share one relationship type name.
pub async fn neighbours(
    tx: &dyn GraphTransaction,
    node_id: &str,
    rel: &RelationshipField,
) -> StoreResult<Vec<(EdgeRecord, NodeRecord)>> {
    let edges = tx.edges(node_id, &rel.rel_type, rel.direction).await?;
    let mut pairs = Vec::with_capacity(edges.len());
    for edge in edges {
        let other = match rel.direction {
            Direction::Out => &edge.target,
            Direction::In => &edge.source,
        };
        if let Some(node) = tx.node(other).await? {
            if node.label == rel.target {
                pairs.push((edge, node));
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_record_carries_id_property() {
        let node = NodeRecord::new("n-1", "Application", Properties::new());
        assert_eq!(node.get("id"), Some(&json!("n-1")));
    }

    #[test]
    fn test_edge_other_end() {
        let edge = EdgeRecord {
            id: "e-1".to_string(),
            rel_type: "USES".to_string(),
            source: "a".to_string(),
            target: "b".to_string(),
            properties: Properties::new(),
        };
        assert_eq!(edge.other_end("a"), "b");
        assert_eq!(edge.other_end("b"), "a");
    }
}
