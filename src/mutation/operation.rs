//! Primitive graph operations emitted by the mutation planner.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum GraphOperation {
    CreateNode { id: String, label: String },
    UpdateNode { id: String, label: String },
    DeleteNode { id: String, label: String },
    CreateEdge {
        id: String,
        rel_type: String,
        source: String,
        target: String,
    },
    UpdateEdge { id: String, rel_type: String },
    DeleteEdge { id: String, rel_type: String },
}

/// Every operation applied within one mutation transaction, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationSequence {
    operations: Vec<GraphOperation>,
}

impl OperationSequence {
    pub fn push(&mut self, operation: GraphOperation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[GraphOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Counts reported to the client.
    pub fn info(&self) -> MutationInfo {
        let mut info = MutationInfo::default();
        for operation in &self.operations {
            match operation {
                GraphOperation::CreateNode { .. } => info.nodes_created += 1,
                GraphOperation::DeleteNode { .. } => info.nodes_deleted += 1,
                GraphOperation::CreateEdge { .. } => info.relationships_created += 1,
                GraphOperation::DeleteEdge { .. } => info.relationships_deleted += 1,
                GraphOperation::UpdateNode { .. } | GraphOperation::UpdateEdge { .. } => {}
            }
        }
        info
    }
}

/// Node and relationship counts of a committed mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationInfo {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
}
