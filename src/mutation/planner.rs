//! Mutation planner.
//!
//! Walks a validated mutation tree and applies the primitive operations it
//! implies to one write transaction, in dependency order:
//!
//! - a created node is inserted, then its nested operations run, then the
//!   edge to its parent is attached;
//! - a deleted node first has its nested deletes applied, then every edge
//!   touching it removed, then the node itself removed;
//! - within one relationship-update element the order is disconnect, delete,
//!   update, connect, create.
//!
//! Operations are applied as they are emitted because later steps read what
//! earlier ones wrote (a nested connect can match a node created a moment
//! before). Nothing is visible outside the transaction until [`commit`].
//!
//! [`commit`]: MutationPlanner::commit

use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;
use uuid::Uuid;

use super::input::{
    ConnectInput, CreateNode, DeleteInput, DeleteNode, DisconnectInput, RelationshipUpdateElement,
    UpdateNode,
};
use super::operation::{GraphOperation, OperationSequence};
use crate::errors::{EngineError, EngineResult};
use crate::query::filter::{ConnectionPredicate, Predicate};
use crate::query::predicate::PredicateEvaluator;
use crate::schema::{Direction, EntityType, Generated, RelationshipField, SchemaRegistry};
use crate::store::{neighbours, EdgeRecord, GraphTransaction, NodeRecord};
use crate::value::{self, Properties};

pub struct MutationPlanner<'a> {
    registry: &'a SchemaRegistry,
    tx: Box<dyn GraphTransaction>,
    sequence: OperationSequence,
    /// Nodes deleted, or being deleted, by a cascade.
    deleting: HashSet<String>,
}

impl<'a> MutationPlanner<'a> {
    pub fn new(registry: &'a SchemaRegistry, tx: Box<dyn GraphTransaction>) -> Self {
        Self {
            registry,
            tx,
            sequence: OperationSequence::default(),
            deleting: HashSet::new(),
        }
    }

    pub fn sequence(&self) -> &OperationSequence {
        &self.sequence
    }

    /// Commit the transaction and hand back what was applied.
    pub async fn commit(self) -> EngineResult<OperationSequence> {
        let MutationPlanner { tx, sequence, .. } = self;
        tx.commit().await?;
        Ok(sequence)
    }

    pub async fn rollback(self) -> EngineResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub async fn create(&mut self, inputs: &[CreateNode]) -> EngineResult<Vec<NodeRecord>> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.create_tree(input).await?);
        }
        Ok(created)
    }

    /// Update every node of `entity` matching `predicate`. Returns the
    /// updated nodes as they stand after all nested operations.
    ///
    /// Matches are resolved to ids up front and each node is re-read right
    /// before it is changed, since nested operations on one match may
    /// already have updated or deleted another.
    pub async fn update(
        &mut self,
        entity: &EntityType,
        predicate: &Predicate,
        update: &UpdateNode,
    ) -> EngineResult<Vec<NodeRecord>> {
        let ids: Vec<String> = PredicateEvaluator::new(self.tx.as_ref())
            .filter_nodes(&entity.name, predicate)
            .await?
            .into_iter()
            .map(|node| node.id)
            .collect();
        debug!("Update matched {} {} nodes", ids.len(), entity.name);

        for id in &ids {
            match self.current(id).await? {
                Some(node) => self.apply_update(node, update).await?,
                None => debug!("Skipping {} '{}', deleted earlier in this request", entity.name, id),
            }
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(node) = self.current(id).await? {
                updated.push(node);
            }
        }
        Ok(updated)
    }

    /// The node as it stands in the transaction, unless this request
    /// removed it.
    async fn current(&self, id: &str) -> EngineResult<Option<NodeRecord>> {
        if self.deleting.contains(id) {
            return Ok(None);
        }
        Ok(self.tx.node(id).await?)
    }

    pub async fn delete(
        &mut self,
        entity: &EntityType,
        predicate: &Predicate,
        delete: &DeleteNode,
    ) -> EngineResult<()> {
        let matched = PredicateEvaluator::new(self.tx.as_ref())
            .filter_nodes(&entity.name, predicate)
            .await?;
        debug!("Delete matched {} {} nodes", matched.len(), entity.name);

        for node in matched {
            self.delete_cascade(node, delete).await?;
        }
        Ok(())
    }

    fn record(&mut self, operation: GraphOperation) {
        debug!("Applied {:?}", operation);
        self.sequence.push(operation);
    }

    fn create_tree<'b>(&'b mut self, input: &'b CreateNode) -> BoxFuture<'b, EngineResult<NodeRecord>> {
        async move {
            let entity = self.registry.entity(&input.entity)?;
            let id = Uuid::new_v4().to_string();

            let mut properties = input.properties.clone();
            for field in entity.generated_fields() {
                match field.generated {
                    Some(Generated::Id) => {
                        properties.insert(field.name.clone(), id.clone().into());
                    }
                    Some(Generated::CreatedAt) => {
                        properties.insert(field.name.clone(), value::now_timestamp().into());
                    }
                    _ => {}
                }
            }

            let node = NodeRecord::new(id, &entity.name, properties);
            self.tx.insert_node(node.clone()).await?;
            self.record(GraphOperation::CreateNode {
                id: node.id.clone(),
                label: node.label.clone(),
            });

            for rel_input in &input.relationships {
                for nested in &rel_input.create {
                    let child = self.create_tree(&nested.node).await?;
                    self.attach(&node, &rel_input.rel, &child, &nested.edge, false)
                        .await?;
                }
                for connect in &rel_input.connect {
                    self.connect(&node, &rel_input.rel, connect).await?;
                }
            }
            Ok(node)
        }
        .boxed()
    }

    fn connect<'b>(
        &'b mut self,
        node: &'b NodeRecord,
        rel: &'b RelationshipField,
        input: &'b ConnectInput,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            let targets = PredicateEvaluator::new(self.tx.as_ref())
                .filter_nodes(&rel.target, &input.where_)
                .await?;
            if targets.is_empty() {
                return Err(EngineError::not_found(format!(
                    "no {} matched the connect on {}.{}",
                    rel.target, node.label, rel.name
                )));
            }

            for target in &targets {
                self.attach(node, rel, target, &input.edge, input.overwrite)
                    .await?;
                for nested in &input.connect {
                    for nested_input in &nested.connect {
                        self.connect(target, &nested.rel, nested_input).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Attach an edge of `rel` between `node` and `other`.
    async fn attach(
        &mut self,
        node: &NodeRecord,
        rel: &RelationshipField,
        other: &NodeRecord,
        properties: &Properties,
        overwrite: bool,
    ) -> EngineResult<()> {
        if overwrite {
            let existing = self
                .tx
                .edges(&node.id, &rel.rel_type, rel.direction)
                .await?
                .into_iter()
                .find(|edge| edge.other_end(&node.id) == other.id);
            if let Some(mut edge) = existing {
                if !properties.is_empty() {
                    edge.properties.extend(properties.clone());
                    self.tx.update_edge(edge.clone()).await?;
                    self.record(GraphOperation::UpdateEdge {
                        id: edge.id,
                        rel_type: edge.rel_type,
                    });
                }
                return Ok(());
            }
        }

        let (source, target) = match rel.direction {
            Direction::Out => (node, other),
            Direction::In => (other, node),
        };
        self.check_cardinality(&rel.rel_type, source, target).await?;

        let edge = EdgeRecord {
            id: Uuid::new_v4().to_string(),
            rel_type: rel.rel_type.clone(),
            source: source.id.clone(),
            target: target.id.clone(),
            properties: properties.clone(),
        };
        self.tx.insert_edge(edge.clone()).await?;
        self.record(GraphOperation::CreateEdge {
            id: edge.id,
            rel_type: edge.rel_type,
            source: edge.source,
            target: edge.target,
        });
        Ok(())
    }

    /// A new `source -> target` edge must not give a second node to any
    /// "one" relationship of either endpoint.
    async fn check_cardinality(
        &self,
        rel_type: &str,
        source: &NodeRecord,
        target: &NodeRecord,
    ) -> EngineResult<()> {
        for side in self.registry.singular_sides(rel_type, &source.label, &target.label) {
            let owner_id = match side.field.direction {
                Direction::Out => &source.id,
                Direction::In => &target.id,
            };
            let held = neighbours(self.tx.as_ref(), owner_id, side.field).await?;
            if let Some((_, current)) = held.first() {
                return Err(EngineError::conflict(format!(
                    "{}.{} of '{}' already holds {} '{}'",
                    side.owner.name, side.field.name, owner_id, current.label, current.id
                )));
            }
        }
        Ok(())
    }

    fn apply_update<'b>(
        &'b mut self,
        node: NodeRecord,
        update: &'b UpdateNode,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            let mut node = node;
            if !update.scalars.is_empty() {
                let entity = self.registry.entity(&update.entity)?;
                for change in &update.scalars {
                    let next = change
                        .op
                        .apply(&change.field, node.properties.get(&change.field.name))?;
                    if next.is_null() {
                        node.properties.remove(&change.field.name);
                    } else {
                        node.properties.insert(change.field.name.clone(), next);
                    }
                }
                for field in entity.generated_fields() {
                    if field.generated == Some(Generated::UpdatedAt) {
                        node.properties
                            .insert(field.name.clone(), value::now_timestamp().into());
                    }
                }
                self.tx.update_node(node.clone()).await?;
                self.record(GraphOperation::UpdateNode {
                    id: node.id.clone(),
                    label: node.label.clone(),
                });
            }

            for rel_update in &update.relationships {
                for element in &rel_update.elements {
                    self.apply_element(&node, &rel_update.rel, element).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn apply_element<'b>(
        &'b mut self,
        node: &'b NodeRecord,
        rel: &'b RelationshipField,
        element: &'b RelationshipUpdateElement,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            for item in &element.disconnect {
                self.disconnect(node, rel, item).await?;
            }

            for item in &element.delete {
                self.delete_related(node, rel, item).await?;
            }

            if element.has_update() {
                let pairs = self
                    .matching_pairs(&node.id, rel, element.where_.as_ref())
                    .await?;
                require_match(node, rel, &pairs, "update")?;
                for (mut edge, related) in pairs {
                    if !element.update_edge.is_empty() {
                        for change in &element.update_edge {
                            let next = change
                                .op
                                .apply(&change.field, edge.properties.get(&change.field.name))?;
                            if next.is_null() {
                                edge.properties.remove(&change.field.name);
                            } else {
                                edge.properties.insert(change.field.name.clone(), next);
                            }
                        }
                        self.tx.update_edge(edge.clone()).await?;
                        self.record(GraphOperation::UpdateEdge {
                            id: edge.id.clone(),
                            rel_type: edge.rel_type.clone(),
                        });
                    }
                    if let Some(node_update) = &element.update_node {
                        if let Some(related) = self.current(&related.id).await? {
                            self.apply_update(related, node_update).await?;
                        }
                    }
                }
            }

            for connect in &element.connect {
                self.connect(node, rel, connect).await?;
            }

            for nested in &element.create {
                let child = self.create_tree(&nested.node).await?;
                self.attach(node, rel, &child, &nested.edge, false).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn disconnect<'b>(
        &'b mut self,
        node: &'b NodeRecord,
        rel: &'b RelationshipField,
        item: &'b DisconnectInput,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            let pairs = self
                .matching_pairs(&node.id, rel, item.where_.as_ref())
                .await?;
            require_match(node, rel, &pairs, "disconnect")?;

            for (edge, related) in pairs {
                self.tx.delete_edge(&edge.id).await?;
                self.record(GraphOperation::DeleteEdge {
                    id: edge.id,
                    rel_type: edge.rel_type,
                });
                for nested in &item.disconnect {
                    for nested_item in &nested.items {
                        self.disconnect(&related, &nested.rel, nested_item).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn delete_related(
        &mut self,
        node: &NodeRecord,
        rel: &RelationshipField,
        item: &DeleteInput,
    ) -> EngineResult<()> {
        let pairs = self
            .matching_pairs(&node.id, rel, item.where_.as_ref())
            .await?;
        require_match(node, rel, &pairs, "delete")?;
        for (_, related) in pairs {
            self.delete_cascade(related, &item.delete).await?;
        }
        Ok(())
    }

    fn delete_cascade<'b>(
        &'b mut self,
        node: NodeRecord,
        delete: &'b DeleteNode,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            if !self.deleting.insert(node.id.clone()) {
                return Ok(());
            }

            for rel_delete in &delete.relationships {
                for item in &rel_delete.items {
                    let pairs = self
                        .matching_pairs(&node.id, &rel_delete.rel, item.where_.as_ref())
                        .await?;
                    for (_, related) in pairs {
                        self.delete_cascade(related, &item.delete).await?;
                    }
                }
            }

            let touching = self.tx.edges_touching(&node.id).await?;
            for edge in touching {
                self.tx.delete_edge(&edge.id).await?;
                self.record(GraphOperation::DeleteEdge {
                    id: edge.id,
                    rel_type: edge.rel_type,
                });
            }
            self.tx.delete_node(&node.id).await?;
            self.record(GraphOperation::DeleteNode {
                id: node.id,
                label: node.label,
            });
            Ok(())
        }
        .boxed()
    }

    async fn matching_pairs(
        &self,
        node_id: &str,
        rel: &RelationshipField,
        predicate: Option<&ConnectionPredicate>,
    ) -> EngineResult<Vec<(EdgeRecord, NodeRecord)>> {
        match predicate {
            Some(predicate) => {
                PredicateEvaluator::new(self.tx.as_ref())
                    .filter_connection(node_id, rel, predicate)
                    .await
            }
            None => Ok(neighbours(self.tx.as_ref(), node_id, rel).await?),
        }
    }
}

/// Operations on a "one" relationship need the related node to exist.
fn require_match(
    node: &NodeRecord,
    rel: &RelationshipField,
    pairs: &[(EdgeRecord, NodeRecord)],
    operation: &str,
) -> EngineResult<()> {
    if !rel.is_many() && pairs.is_empty() {
        return Err(EngineError::not_found(format!(
            "{} on {}.{} of '{}' found no related {}",
            operation, node.label, rel.name, node.id, rel.target
        )));
    }
    Ok(())
}
