//! sf-graph: sewer network model.
//!
//! Provides:
//! - Capacities (manholes, storage nodes, infiltration nodes, outlets)
//! - Edges (pipes, pumps, weirs, chokes) with upper/lower connections
//! - Interned cross-section profiles
//! - Incremental network builder with orientation normalization
//! - Manual id to auto id indexing
//!
//! # Example
//!
//! ```
//! use sf_core::ManualId;
//! use sf_graph::{BuildType, CapacityDetail, EdgeDraft, NetworkBuilder, NodeDraft, Position, ProfileShape};
//!
//! let mut builder = NetworkBuilder::new();
//! let a = builder
//!     .add_node(NodeDraft::manhole(ManualId(1), "S1", Position::new(0.0, 0.0), 101.0))
//!     .unwrap();
//! let b = builder
//!     .add_node(NodeDraft::manhole(ManualId(2), "S2", Position::new(30.0, 40.0), 100.0))
//!     .unwrap();
//! builder
//!     .add_edge(EdgeDraft::new(ManualId(10), "R1", BuildType::Pipe, a, 101.0, b, 100.0, ProfileShape::circular_mm(300.0)))
//!     .unwrap();
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.nodes().len(), 2);
//! assert_eq!(network.edges()[0].length, 50.0);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod indexing;
pub mod profile;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::{EdgeDraft, NetworkBuilder, NodeDraft};
pub use error::{GraphError, GraphResult};
pub use graph::{
    BuildType, Capacity, CapacityDetail, CapacityKind, Connection, Edge, EntityFamily, Network,
    NodeCommon, Position,
};
pub use indexing::IndexMap;
pub use profile::{Profile, ProfileCache, ProfileKey, ProfileShape};
