//! Network validation logic.

use std::collections::HashSet;

use crate::error::{GraphError, GraphResult};
use crate::graph::{Capacity, Edge};
use crate::profile::Profile;

/// Validate the network structure: auto ids are dense, references exist,
/// endpoints are distinct, manual ids unique per family.
pub(crate) fn validate_structure(
    nodes: &[Capacity],
    edges: &[Edge],
    profiles: &[Profile],
    normalized: bool,
) -> GraphResult<()> {
    // Auto ids must be a bijection onto 0..len
    for (i, node) in nodes.iter().enumerate() {
        if node.id().slot() != i {
            return Err(GraphError::IdOverflow { what: "nodes" });
        }
    }
    for (i, edge) in edges.iter().enumerate() {
        if edge.id.slot() != i {
            return Err(GraphError::IdOverflow { what: "edges" });
        }
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.manual_id()) {
            return Err(GraphError::DuplicateManualId {
                what: "node",
                id: node.manual_id(),
            });
        }
    }

    seen.clear();
    for edge in edges {
        if !seen.insert(edge.manual_id) {
            return Err(GraphError::DuplicateManualId {
                what: "edge",
                id: edge.manual_id,
            });
        }

        for conn in [&edge.upper, &edge.lower] {
            if conn.node.slot() >= nodes.len() {
                return Err(GraphError::InvalidNodeRef {
                    edge: edge.manual_id,
                    node: conn.node,
                });
            }
        }

        if edge.upper.node == edge.lower.node {
            return Err(GraphError::SelfLoop {
                edge: edge.manual_id,
                node: edge.upper.node,
            });
        }

        if edge.profile.slot() >= profiles.len() {
            return Err(GraphError::UnknownProfile { edge: edge.id });
        }

        if normalized && edge.upper.height < edge.lower.height {
            return Err(GraphError::Orientation {
                edge: edge.manual_id,
            });
        }
    }

    Ok(())
}
