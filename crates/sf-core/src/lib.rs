//! sf-core: stable foundation for sewerflow.
//!
//! Contains:
//! - ids (dense auto ids and externally assigned manual ids)
//! - units (uom SI types, constructors, store unit conversions)
//! - numeric (planar geometry helpers)
//! - metrics (caller-owned load counters and timers)

pub mod ids;
pub mod metrics;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use metrics::{AccumulatingTimer, LoadMetrics, MetricsSnapshot, Timer};
pub use numeric::*;
pub use units::*;
