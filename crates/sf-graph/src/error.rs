//! Graph-specific error types.

use sf_core::{EdgeId, ManualId, NodeId};

pub type GraphResult<T> = Result<T, GraphError>;

/// Network construction and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge refers to a node that doesn't exist.
    InvalidNodeRef { edge: ManualId, node: NodeId },

    /// Both connections of an edge reference the same node.
    SelfLoop { edge: ManualId, node: NodeId },

    /// A manual id appears twice within one entity family.
    DuplicateManualId { what: &'static str, id: ManualId },

    /// A node name is used twice; names are the edge join key.
    DuplicateName { name: String },

    /// An edge references a profile that was never interned.
    UnknownProfile { edge: EdgeId },

    /// Upper connection lies below the lower one after normalization.
    Orientation { edge: ManualId },

    /// Auto ids no longer fit the id type.
    IdOverflow { what: &'static str },

    /// Manual id not found in index map.
    IdNotFound { what: &'static str, id: ManualId },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::InvalidNodeRef { edge, node } => {
                write!(f, "Edge {} refers to non-existent node {}", edge, node)
            }
            GraphError::SelfLoop { edge, node } => {
                write!(f, "Edge {} connects node {} to itself", edge, node)
            }
            GraphError::DuplicateManualId { what, id } => {
                write!(f, "Duplicate {} manual id {}", what, id)
            }
            GraphError::DuplicateName { name } => {
                write!(f, "Duplicate node name '{}'", name)
            }
            GraphError::UnknownProfile { edge } => {
                write!(f, "Edge {} references an unknown profile", edge)
            }
            GraphError::Orientation { edge } => {
                write!(f, "Edge {} upper invert lies below its lower invert", edge)
            }
            GraphError::IdOverflow { what } => {
                write!(f, "Too many {} for the auto id range", what)
            }
            GraphError::IdNotFound { what, id } => {
                write!(f, "{} {} not found in index map", what, id)
            }
        }
    }
}

impl std::error::Error for GraphError {}
