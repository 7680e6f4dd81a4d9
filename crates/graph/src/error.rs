use thiserror::Error;

use crate::types::NodeId;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while indexing or contracting a call tree.
///
/// Every structural variant names the node it was found on so callers can
/// point at the exact spot in the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node id {id}")]
    DuplicateId { id: NodeId },

    #[error("Node {node} references missing parent {parent}")]
    DanglingParent { node: NodeId, parent: NodeId },

    #[error("Node {node} references missing child {child}")]
    DanglingChild { node: NodeId, child: NodeId },

    #[error("Node {node} lists child {child} more than once")]
    DuplicateChild { node: NodeId, child: NodeId },

    #[error("Node {node} has parent {parent} but is listed as a child of {listed_by}")]
    ConflictingParent {
        node: NodeId,
        parent: NodeId,
        listed_by: NodeId,
    },

    #[error("Parent chain of node {node} contains a cycle")]
    Cycle { node: NodeId },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Removal policy failed on node {node}: {source}")]
    Policy {
        node: NodeId,
        #[source]
        source: PolicyError,
    },
}

impl GraphError {
    /// Id of the node the error was detected on.
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::DuplicateId { id } => *id,
            Self::DanglingParent { node, .. }
            | Self::DanglingChild { node, .. }
            | Self::DuplicateChild { node, .. }
            | Self::ConflictingParent { node, .. }
            | Self::Cycle { node }
            | Self::Policy { node, .. } => *node,
            Self::NodeNotFound(id) => *id,
        }
    }
}

/// Failure signalled by a [`crate::KeepPolicy`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
