//! Incremental network builder.

use std::collections::HashMap;

use sf_core::{EdgeId, Id, ManualId, NodeId};

use crate::error::{GraphError, GraphResult};
use crate::graph::{
    BuildType, Capacity, CapacityDetail, Connection, Edge, Network, NodeCommon, Position,
};
use crate::profile::{ProfileCache, ProfileShape};
use crate::validate;

/// Everything needed to add a capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub manual_id: ManualId,
    pub name: String,
    pub position: Position,
    pub sole_height: f64,
    pub detail: CapacityDetail,
}

impl NodeDraft {
    /// A manhole whose top and surface coincide with its sole (no shaft data).
    pub fn manhole(
        manual_id: ManualId,
        name: impl Into<String>,
        position: Position,
        sole_height: f64,
    ) -> Self {
        Self {
            manual_id,
            name: name.into(),
            position,
            sole_height,
            detail: CapacityDetail::Manhole {
                top_height: sole_height,
                surface_height: sole_height,
                shape: None,
            },
        }
    }
}

/// Everything needed to add an edge. Endpoints are given in raw store order.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDraft {
    pub manual_id: ManualId,
    pub name: String,
    pub build_type: BuildType,
    pub upper_node: NodeId,
    pub upper_height: f64,
    pub lower_node: NodeId,
    pub lower_height: f64,
    /// Stored length; `None` or non-positive selects the build type default.
    pub length: Option<f64>,
    pub shape: ProfileShape,
}

impl EdgeDraft {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manual_id: ManualId,
        name: impl Into<String>,
        build_type: BuildType,
        upper_node: NodeId,
        upper_height: f64,
        lower_node: NodeId,
        lower_height: f64,
        shape: ProfileShape,
    ) -> Self {
        Self {
            manual_id,
            name: name.into(),
            build_type,
            upper_node,
            upper_height,
            lower_node,
            lower_height,
            length: None,
            shape,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }
}

/// Builder for constructing a network incrementally.
///
/// Auto ids are assigned in insertion order. Call `build()` to validate and
/// freeze the result into an immutable [`Network`].
#[derive(Debug)]
pub struct NetworkBuilder {
    nodes: Vec<Capacity>,
    edges: Vec<Edge>,
    profiles: ProfileCache,
    node_by_name: HashMap<String, NodeId>,
    node_by_manual: HashMap<ManualId, NodeId>,
    edge_by_manual: HashMap<ManualId, EdgeId>,
    normalize_orientation: bool,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBuilder {
    /// Create a new empty builder that normalizes edge orientation.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            profiles: ProfileCache::new(),
            node_by_name: HashMap::new(),
            node_by_manual: HashMap::new(),
            edge_by_manual: HashMap::new(),
            normalize_orientation: true,
        }
    }

    /// Keep or drop the gravity-flow orientation normalization.
    pub fn normalize_orientation(mut self, on: bool) -> Self {
        self.normalize_orientation = on;
        self
    }

    /// Add a capacity and return its auto id.
    pub fn add_node(&mut self, draft: NodeDraft) -> GraphResult<NodeId> {
        if self.node_by_manual.contains_key(&draft.manual_id) {
            return Err(GraphError::DuplicateManualId {
                what: "node",
                id: draft.manual_id,
            });
        }
        if self.node_by_name.contains_key(&draft.name) {
            return Err(GraphError::DuplicateName { name: draft.name });
        }
        let id = next_id(self.nodes.len(), "nodes")?;

        let common = NodeCommon {
            id,
            manual_id: draft.manual_id,
            name: draft.name.clone(),
            position: draft.position,
            sole_height: draft.sole_height,
            connections: Vec::new(),
        };
        let capacity = match draft.detail {
            CapacityDetail::Manhole {
                top_height,
                surface_height,
                shape,
            } => {
                let profile = match shape {
                    Some(shape) => Some(
                        self.profiles
                            .intern(shape)
                            .ok_or(GraphError::IdOverflow { what: "profiles" })?,
                    ),
                    None => None,
                };
                Capacity::Manhole {
                    common,
                    top_height,
                    surface_height,
                    profile,
                }
            }
            CapacityDetail::StorageNode { volume } => Capacity::StorageNode { common, volume },
            CapacityDetail::InfiltrationNode { infiltration_rate } => Capacity::InfiltrationNode {
                common,
                infiltration_rate,
            },
            CapacityDetail::Outlet { boundary_level } => Capacity::Outlet {
                common,
                boundary_level,
            },
        };

        self.node_by_manual.insert(draft.manual_id, id);
        self.node_by_name.insert(draft.name, id);
        self.nodes.push(capacity);
        Ok(id)
    }

    /// Resolve a node by the name edges use to reference it.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_by_name.get(name).copied()
    }

    pub fn node_by_manual(&self, manual_id: ManualId) -> Option<NodeId> {
        self.node_by_manual.get(&manual_id).copied()
    }

    /// Add an edge, normalizing its orientation if enabled.
    pub fn add_edge(&mut self, draft: EdgeDraft) -> GraphResult<EdgeId> {
        if self.edge_by_manual.contains_key(&draft.manual_id) {
            return Err(GraphError::DuplicateManualId {
                what: "edge",
                id: draft.manual_id,
            });
        }
        let upper_pos = self.node_position(draft.manual_id, draft.upper_node)?;
        let lower_pos = self.node_position(draft.manual_id, draft.lower_node)?;
        if draft.upper_node == draft.lower_node {
            return Err(GraphError::SelfLoop {
                edge: draft.manual_id,
                node: draft.upper_node,
            });
        }

        let mut upper = Connection {
            node: draft.upper_node,
            height: draft.upper_height,
            position: upper_pos,
        };
        let mut lower = Connection {
            node: draft.lower_node,
            height: draft.lower_height,
            position: lower_pos,
        };
        let swapped = self.normalize_orientation && upper.height < lower.height;
        if swapped {
            std::mem::swap(&mut upper, &mut lower);
        }

        let length = match draft.length {
            Some(l) if l > 0.0 => l,
            _ => draft
                .build_type
                .default_length(upper_pos.distance_to(&lower_pos)),
        };
        let profile = self
            .profiles
            .intern(draft.shape)
            .ok_or(GraphError::IdOverflow { what: "profiles" })?;
        let id = next_id(self.edges.len(), "edges")?;

        self.edge_by_manual.insert(draft.manual_id, id);
        self.edges.push(Edge {
            id,
            manual_id: draft.manual_id,
            name: draft.name,
            build_type: draft.build_type,
            upper,
            lower,
            length,
            profile,
            swapped,
        });
        Ok(id)
    }

    /// Build and validate the network, returning an immutable `Network`.
    ///
    /// Fills each capacity's connection list from the edges.
    pub fn build(mut self) -> GraphResult<Network> {
        for edge in &self.edges {
            for node in [edge.upper.node, edge.lower.node] {
                if let Some(n) = self.nodes.get_mut(node.slot()) {
                    n.common_mut().connections.push(edge.id);
                }
            }
        }

        let profiles = self.profiles.into_profiles();
        validate::validate_structure(
            &self.nodes,
            &self.edges,
            &profiles,
            self.normalize_orientation,
        )?;

        Ok(Network {
            nodes: self.nodes,
            edges: self.edges,
            profiles,
            normalized: self.normalize_orientation,
        })
    }

    fn node_position(&self, edge: ManualId, node: NodeId) -> GraphResult<Position> {
        self.nodes
            .get(node.slot())
            .map(Capacity::position)
            .ok_or(GraphError::InvalidNodeRef { edge, node })
    }
}

fn next_id(len: usize, what: &'static str) -> GraphResult<Id> {
    u32::try_from(len)
        .ok()
        .and_then(Id::try_from_index)
        .ok_or(GraphError::IdOverflow { what })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes(builder: &mut NetworkBuilder) -> (NodeId, NodeId) {
        let a = builder
            .add_node(NodeDraft::manhole(
                ManualId(1),
                "A",
                Position::new(0.0, 0.0),
                100.0,
            ))
            .unwrap();
        let b = builder
            .add_node(NodeDraft::manhole(
                ManualId(2),
                "B",
                Position::new(3.0, 4.0),
                99.0,
            ))
            .unwrap();
        (a, b)
    }

    #[test]
    fn auto_ids_follow_insertion_order() {
        let mut builder = NetworkBuilder::new();
        let (a, b) = two_nodes(&mut builder);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(builder.node_by_name("B"), Some(b));
        assert_eq!(builder.node_by_manual(ManualId(1)), Some(a));
    }

    #[test]
    fn duplicate_manual_id_rejected() {
        let mut builder = NetworkBuilder::new();
        two_nodes(&mut builder);
        let err = builder
            .add_node(NodeDraft::manhole(
                ManualId(1),
                "C",
                Position::default(),
                0.0,
            ))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateManualId { .. }));
    }

    #[test]
    fn manual_ids_unique_per_family() {
        let mut builder = NetworkBuilder::new();
        let (a, b) = two_nodes(&mut builder);
        let storage = NodeDraft {
            detail: CapacityDetail::StorageNode { volume: 50.0 },
            ..NodeDraft::manhole(ManualId(2), "S", Position::default(), 0.0)
        };
        let err = builder.add_node(storage).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateManualId {
                what: "node",
                id: ManualId(2),
            }
        );

        builder
            .add_edge(EdgeDraft::new(
                ManualId(1),
                "R1",
                BuildType::Pipe,
                a,
                100.0,
                b,
                99.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap();
        let net = builder.build().unwrap();
        assert_eq!(net.edges()[0].manual_id, ManualId(1));
        assert_eq!(net.nodes()[0].manual_id(), ManualId(1));
    }

    #[test]
    fn self_loop_rejected() {
        let mut builder = NetworkBuilder::new();
        let (a, _) = two_nodes(&mut builder);
        let err = builder
            .add_edge(EdgeDraft::new(
                ManualId(10),
                "R",
                BuildType::Pipe,
                a,
                100.0,
                a,
                99.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap_err();
        assert!(matches!(err, GraphError::SelfLoop { .. }));
    }

    #[test]
    fn inverted_edge_is_swapped() {
        let mut builder = NetworkBuilder::new();
        let (a, b) = two_nodes(&mut builder);
        builder
            .add_edge(EdgeDraft::new(
                ManualId(10),
                "R",
                BuildType::Pipe,
                b,
                99.0,
                a,
                100.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap();
        let net = builder.build().unwrap();
        let edge = &net.edges()[0];
        assert!(edge.swapped);
        assert_eq!(edge.upper.node, a);
        assert!(edge.upper.height >= edge.lower.height);
        assert_eq!(edge.length, 5.0);
    }

    #[test]
    fn raw_orientation_kept_when_disabled() {
        let mut builder = NetworkBuilder::new().normalize_orientation(false);
        let (a, b) = two_nodes(&mut builder);
        builder
            .add_edge(
                EdgeDraft::new(
                    ManualId(10),
                    "P",
                    BuildType::Pump,
                    b,
                    99.0,
                    a,
                    100.0,
                    ProfileShape::circular_mm(100.0),
                )
                .with_length(0.0),
            )
            .unwrap();
        let net = builder.build().unwrap();
        let edge = &net.edges()[0];
        assert!(!edge.swapped);
        assert_eq!(edge.upper.node, b);
        assert_eq!(edge.length, 1.0);
    }

    #[test]
    fn build_fills_connections() {
        let mut builder = NetworkBuilder::new();
        let (a, b) = two_nodes(&mut builder);
        let e = builder
            .add_edge(EdgeDraft::new(
                ManualId(10),
                "R",
                BuildType::Pipe,
                a,
                100.0,
                b,
                99.0,
                ProfileShape::circular_mm(300.0),
            ))
            .unwrap();
        let net = builder.build().unwrap();
        assert_eq!(net.node(a).unwrap().connections(), &[e]);
        assert_eq!(net.node(b).unwrap().connections(), &[e]);
    }
}
