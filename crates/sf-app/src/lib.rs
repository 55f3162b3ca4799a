//! Shared application service layer for sewerflow.
//!
//! Turns a simulator result store into a network with timelines:
//! configuration, topology loading, timeline synchronization, 2D surface
//! lookups, and the [`ResultSet`] accessors front ends read from.

pub mod config;
pub mod error;
pub mod result_set;
pub mod surface;
pub mod synchronizer;
pub mod topology;

pub use config::{LoaderConfig, SurfaceConfig};
pub use error::{AppError, AppResult};
pub use result_set::ResultSet;
pub use surface::{SurfaceSeries, open_surface, surface_series};
pub use synchronizer::{
    DENSE_NOMINAL_LEVEL, EdgeSample, MergeCursor, SPARSE_NOMINAL_LEVEL, TimelineSynchronizer,
};
pub use topology::{CoordinateTransform, LoadReport, SkippedEntity, TopologyLoader};
