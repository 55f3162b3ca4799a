//! Manual id indexing.
//!
//! Maps the externally assigned manual ids onto auto ids, and keeps each
//! family's entities sorted by manual id for the bulk merge against
//! id-ordered record streams.

use std::collections::HashMap;

use sf_core::{EdgeId, ManualId, NodeId};

use crate::error::{GraphError, GraphResult};
use crate::graph::Network;

/// Index map providing manual id lookup and sorted entity lists.
#[derive(Debug, Clone)]
pub struct IndexMap {
    node_by_manual: HashMap<ManualId, NodeId>,
    edge_by_manual: HashMap<ManualId, EdgeId>,

    /// Nodes sorted ascending by manual id.
    nodes_sorted: Vec<(ManualId, NodeId)>,

    /// Edges sorted ascending by manual id.
    edges_sorted: Vec<(ManualId, EdgeId)>,
}

impl IndexMap {
    /// Build an index map from a network.
    pub fn from_network(network: &Network) -> Self {
        let mut nodes_sorted: Vec<(ManualId, NodeId)> = network
            .nodes()
            .iter()
            .map(|n| (n.manual_id(), n.id()))
            .collect();
        let mut edges_sorted: Vec<(ManualId, EdgeId)> = network
            .edges()
            .iter()
            .map(|e| (e.manual_id, e.id))
            .collect();
        nodes_sorted.sort_unstable();
        edges_sorted.sort_unstable();

        Self {
            node_by_manual: nodes_sorted.iter().copied().collect(),
            edge_by_manual: edges_sorted.iter().copied().collect(),
            nodes_sorted,
            edges_sorted,
        }
    }

    /// Get the auto id for a node manual id.
    pub fn node(&self, id: ManualId) -> GraphResult<NodeId> {
        self.node_by_manual
            .get(&id)
            .copied()
            .ok_or(GraphError::IdNotFound { what: "Node", id })
    }

    /// Get the auto id for an edge manual id.
    pub fn edge(&self, id: ManualId) -> GraphResult<EdgeId> {
        self.edge_by_manual
            .get(&id)
            .copied()
            .ok_or(GraphError::IdNotFound { what: "Edge", id })
    }

    /// All nodes, ascending by manual id.
    pub fn sorted_nodes(&self) -> &[(ManualId, NodeId)] {
        &self.nodes_sorted
    }

    /// All edges, ascending by manual id.
    pub fn sorted_edges(&self) -> &[(ManualId, EdgeId)] {
        &self.edges_sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeDraft, NetworkBuilder, NodeDraft};
    use crate::graph::{BuildType, Position};
    use crate::profile::ProfileShape;

    fn network() -> Network {
        let mut builder = NetworkBuilder::new();
        let mut ids = Vec::new();
        for (i, manual) in [30_i64, 10, 20].into_iter().enumerate() {
            ids.push(
                builder
                    .add_node(NodeDraft::manhole(
                        ManualId(manual),
                        format!("N{manual}"),
                        Position::new(i as f64, 0.0),
                        10.0 - i as f64,
                    ))
                    .unwrap(),
            );
        }
        builder
            .add_edge(EdgeDraft::new(
                ManualId(5),
                "R5",
                BuildType::Pipe,
                ids[0],
                10.0,
                ids[1],
                9.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap();
        builder
            .add_edge(EdgeDraft::new(
                ManualId(2),
                "P2",
                BuildType::Pump,
                ids[1],
                9.0,
                ids[2],
                8.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn sorted_by_manual_id() {
        let net = network();
        let idx = IndexMap::from_network(&net);
        let manual: Vec<i64> = idx.sorted_nodes().iter().map(|(m, _)| m.0).collect();
        assert_eq!(manual, vec![10, 20, 30]);
        let manual: Vec<i64> = idx.sorted_edges().iter().map(|(m, _)| m.0).collect();
        assert_eq!(manual, vec![2, 5]);
    }

    #[test]
    fn lookup_and_missing() {
        let net = network();
        let idx = IndexMap::from_network(&net);
        assert_eq!(idx.node(ManualId(30)).unwrap().index(), 0);
        assert_eq!(idx.edge(ManualId(2)).unwrap().index(), 1);
        assert!(idx.node(ManualId(999)).is_err());
    }
}
