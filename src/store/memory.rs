//! In-memory graph store.
//!
//! Committed state is an immutable snapshot behind a `tokio::sync::RwLock`.
//! Readers clone the snapshot pointer and never block writers. Writers are
//! serialised by a mutex, work on a private copy and swap it in on commit,
//! so an abandoned write transaction leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{EdgeRecord, GraphCounts, GraphStore, GraphTransaction, NodeRecord};
use crate::errors::{StoreError, StoreResult};
use crate::schema::Direction;

#[derive(Debug, Clone, Default)]
struct GraphState {
    nodes: BTreeMap<String, NodeRecord>,
    edges: BTreeMap<String, EdgeRecord>,
    // node id -> ids of edges touching it
    adjacency: HashMap<String, BTreeSet<String>>,
}

impl GraphState {
    fn touching(&self, node_id: &str) -> impl Iterator<Item = &EdgeRecord> {
        self.adjacency
            .get(node_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.edges.get(id))
    }
}

#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    committed: Arc<RwLock<Arc<GraphState>>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        let snapshot = self.committed.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            snapshot,
            writer: None,
        }))
    }

    async fn begin_write(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let snapshot = self.committed.read().await.clone();
        let working = (*snapshot).clone();
        Ok(Box::new(MemoryTransaction {
            snapshot,
            writer: Some(WriteContext {
                working,
                committed: self.committed.clone(),
                _guard: guard,
            }),
        }))
    }

    async fn counts(&self) -> StoreResult<GraphCounts> {
        let snapshot = self.committed.read().await.clone();
        Ok(GraphCounts {
            nodes: snapshot.nodes.len() as u64,
            edges: snapshot.edges.len() as u64,
        })
    }
}

struct WriteContext {
    working: GraphState,
    committed: Arc<RwLock<Arc<GraphState>>>,
    _guard: OwnedMutexGuard<()>,
}

pub struct MemoryTransaction {
    snapshot: Arc<GraphState>,
    writer: Option<WriteContext>,
}

impl MemoryTransaction {
    fn state(&self) -> &GraphState {
        match &self.writer {
            Some(writer) => &writer.working,
            None => &self.snapshot,
        }
    }

    fn state_mut(&mut self) -> StoreResult<&mut GraphState> {
        self.writer
            .as_mut()
            .map(|writer| &mut writer.working)
            .ok_or(StoreError::ReadOnly)
    }
}

#[async_trait]
impl GraphTransaction for MemoryTransaction {
    async fn node(&self, id: &str) -> StoreResult<Option<NodeRecord>> {
        Ok(self.state().nodes.get(id).cloned())
    }

    async fn nodes_by_label(&self, label: &str) -> StoreResult<Vec<NodeRecord>> {
        Ok(self
            .state()
            .nodes
            .values()
            .filter(|node| node.label == label)
            .cloned()
            .collect())
    }

    async fn edges(
        &self,
        node_id: &str,
        rel_type: &str,
        direction: Direction,
    ) -> StoreResult<Vec<EdgeRecord>> {
        Ok(self
            .state()
            .touching(node_id)
            .filter(|edge| edge.rel_type == rel_type)
            .filter(|edge| match direction {
                Direction::Out => edge.source == node_id,
                Direction::In => edge.target == node_id,
            })
            .cloned()
            .collect())
    }

    async fn edges_touching(&self, node_id: &str) -> StoreResult<Vec<EdgeRecord>> {
        Ok(self.state().touching(node_id).cloned().collect())
    }

    async fn insert_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        let state = self.state_mut()?;
        if state.nodes.contains_key(&node.id) {
            return Err(StoreError::Constraint(format!(
                "node '{}' already exists",
                node.id
            )));
        }
        state.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn update_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        let state = self.state_mut()?;
        match state.nodes.get_mut(&node.id) {
            Some(existing) => {
                *existing = node;
                Ok(())
            }
            None => Err(StoreError::NodeNotFound(node.id)),
        }
    }

    async fn delete_node(&mut self, id: &str) -> StoreResult<()> {
        let state = self.state_mut()?;
        if !state.nodes.contains_key(id) {
            return Err(StoreError::NodeNotFound(id.to_string()));
        }
        let attached = state.adjacency.get(id).map_or(0, |ids| ids.len());
        if attached > 0 {
            return Err(StoreError::Constraint(format!(
                "node '{}' still has {} edges",
                id, attached
            )));
        }
        state.nodes.remove(id);
        state.adjacency.remove(id);
        Ok(())
    }

    async fn insert_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        let state = self.state_mut()?;
        for endpoint in [&edge.source, &edge.target] {
            if !state.nodes.contains_key(endpoint) {
                return Err(StoreError::NodeNotFound(endpoint.clone()));
            }
        }
        if state.edges.contains_key(&edge.id) {
            return Err(StoreError::Constraint(format!(
                "edge '{}' already exists",
                edge.id
            )));
        }
        for endpoint in [&edge.source, &edge.target] {
            state
                .adjacency
                .entry(endpoint.clone())
                .or_default()
                .insert(edge.id.clone());
        }
        state.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    async fn update_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        let state = self.state_mut()?;
        match state.edges.get_mut(&edge.id) {
            Some(existing) => {
                existing.properties = edge.properties;
                Ok(())
            }
            None => Err(StoreError::EdgeNotFound(edge.id)),
        }
    }

    async fn delete_edge(&mut self, id: &str) -> StoreResult<()> {
        let state = self.state_mut()?;
        let edge = state
            .edges
            .remove(id)
            .ok_or_else(|| StoreError::EdgeNotFound(id.to_string()))?;
        for endpoint in [&edge.source, &edge.target] {
            if let Some(ids) = state.adjacency.get_mut(endpoint) {
                ids.remove(id);
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if let Some(writer) = self.writer {
            let mut committed = writer.committed.write().await;
            debug!(
                "Committing memory graph: {} nodes, {} edges",
                writer.working.nodes.len(),
                writer.working.edges.len()
            );
            *committed = Arc::new(writer.working);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
