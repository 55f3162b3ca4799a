//! Core network data structures.

use sf_core::{EdgeId, ManualId, NodeId, ProfileId};

use crate::profile::Profile;

/// Planar position in the store's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        sf_core::distance((self.x, self.y), (other.x, other.y))
    }

    /// Apply an externally supplied coordinate transformation.
    pub fn transformed(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Position {
        let (x, y) = f(self.x, self.y);
        Position { x, y }
    }
}

/// Discriminant of a [`Capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityKind {
    Manhole,
    StorageNode,
    InfiltrationNode,
    Outlet,
}

/// Which family of entities a timeline addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFamily {
    Nodes,
    Edges,
}

/// Fields every capacity carries.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCommon {
    pub id: NodeId,
    pub manual_id: ManualId,
    pub name: String,
    pub position: Position,
    /// Invert (bottom) height.
    pub sole_height: f64,
    /// Incident edges, in edge insertion order.
    pub connections: Vec<EdgeId>,
}

/// Kind-specific data supplied when adding a node.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityDetail {
    Manhole {
        top_height: f64,
        surface_height: f64,
        shape: Option<crate::ProfileShape>,
    },
    StorageNode {
        volume: f64,
    },
    InfiltrationNode {
        infiltration_rate: f64,
    },
    Outlet {
        boundary_level: Option<f64>,
    },
}

/// A network node.
#[derive(Debug, Clone, PartialEq)]
pub enum Capacity {
    Manhole {
        common: NodeCommon,
        top_height: f64,
        surface_height: f64,
        profile: Option<ProfileId>,
    },
    StorageNode {
        common: NodeCommon,
        volume: f64,
    },
    InfiltrationNode {
        common: NodeCommon,
        infiltration_rate: f64,
    },
    Outlet {
        common: NodeCommon,
        boundary_level: Option<f64>,
    },
}

impl Capacity {
    pub fn common(&self) -> &NodeCommon {
        match self {
            Capacity::Manhole { common, .. }
            | Capacity::StorageNode { common, .. }
            | Capacity::InfiltrationNode { common, .. }
            | Capacity::Outlet { common, .. } => common,
        }
    }

    pub(crate) fn common_mut(&mut self) -> &mut NodeCommon {
        match self {
            Capacity::Manhole { common, .. }
            | Capacity::StorageNode { common, .. }
            | Capacity::InfiltrationNode { common, .. }
            | Capacity::Outlet { common, .. } => common,
        }
    }

    pub fn kind(&self) -> CapacityKind {
        match self {
            Capacity::Manhole { .. } => CapacityKind::Manhole,
            Capacity::StorageNode { .. } => CapacityKind::StorageNode,
            Capacity::InfiltrationNode { .. } => CapacityKind::InfiltrationNode,
            Capacity::Outlet { .. } => CapacityKind::Outlet,
        }
    }

    pub fn id(&self) -> NodeId {
        self.common().id
    }

    pub fn manual_id(&self) -> ManualId {
        self.common().manual_id
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn position(&self) -> Position {
        self.common().position
    }

    pub fn connections(&self) -> &[EdgeId] {
        &self.common().connections
    }

    /// Height at which water leaves the node onto the surface.
    ///
    /// Only manholes have a surface; other capacities report `None`.
    pub fn surface_height(&self) -> Option<f64> {
        match self {
            Capacity::Manhole { surface_height, .. } => Some(*surface_height),
            _ => None,
        }
    }
}

/// Hydraulic role of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildType {
    Pipe,
    Pump,
    Weir,
    /// Discharge regulator.
    Choke,
}

impl BuildType {
    pub const ALL: [BuildType; 4] = [
        BuildType::Pipe,
        BuildType::Pump,
        BuildType::Weir,
        BuildType::Choke,
    ];

    /// Length used when the store reports none.
    ///
    /// Pipes fall back to the straight-line distance between their endpoints.
    pub fn default_length(self, straight_distance: f64) -> f64 {
        match self {
            BuildType::Pipe => straight_distance,
            BuildType::Pump | BuildType::Choke => 1.0,
            BuildType::Weir => 0.5,
        }
    }

    /// Non-conduit structures report zero velocity alongside real discharge.
    pub fn substitutes_velocity(self) -> bool {
        !matches!(self, BuildType::Pipe)
    }
}

/// One end of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub node: NodeId,
    /// Invert height (or offset height for structures) at this end.
    pub height: f64,
    pub position: Position,
}

/// A network edge.
///
/// Invariant: `upper.node != lower.node`. When the network was built with
/// orientation normalization, `upper.height >= lower.height`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub manual_id: ManualId,
    pub name: String,
    pub build_type: BuildType,
    pub upper: Connection,
    pub lower: Connection,
    /// Length in metres.
    pub length: f64,
    pub profile: ProfileId,
    /// True when the raw data listed the endpoints the other way round.
    pub swapped: bool,
}

impl Edge {
    /// Gradient along the edge, positive when falling from upper to lower.
    pub fn slope(&self) -> f64 {
        if self.length > 0.0 {
            (self.upper.height - self.lower.height) / self.length
        } else {
            0.0
        }
    }
}

/// The network: an immutable collection of capacities, edges and profiles.
///
/// Auto ids index directly into the vectors.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Vec<Capacity>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) profiles: Vec<Profile>,
    pub(crate) normalized: bool,
}

impl Network {
    /// Return all capacities.
    pub fn nodes(&self) -> &[Capacity] {
        &self.nodes
    }

    /// Return all edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Return all interned profiles.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn node(&self, id: NodeId) -> Option<&Capacity> {
        self.nodes.get(id.slot())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.slot())
    }

    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(id.slot())
    }

    /// Profile of an edge (always present in a built network).
    pub fn edge_profile(&self, edge: &Edge) -> Option<&Profile> {
        self.profile(edge.profile)
    }

    pub fn nodes_of_kind(&self, kind: CapacityKind) -> impl Iterator<Item = &Capacity> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    pub fn edges_of_type(&self, build_type: BuildType) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| e.build_type == build_type)
    }

    pub fn family_len(&self, family: EntityFamily) -> usize {
        match family {
            EntityFamily::Nodes => self.nodes.len(),
            EntityFamily::Edges => self.edges.len(),
        }
    }

    /// Whether edge orientation was normalized during construction.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }
}
