//! sf-results: binary result blobs and timeline containers.

pub mod blob;
pub mod quantity;
pub mod timeline;

pub use blob::{
    COORDINATE_BLOB_LEN, TimedValue, decode_coordinate, decode_time_series, encode_coordinate,
    encode_time_series, ms_to_ticks, ticks_to_ms,
};
pub use quantity::Quantity;
pub use timeline::{DenseTimelines, EntitySeries, SparseTimelines, TimeAxis, Timelines};

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResultsError {
    #[error("Malformed blob: {what}")]
    MalformedBlob { what: String },

    #[error("Time axis is not strictly increasing at index {index}")]
    UnorderedTimeAxis { index: usize },

    #[error("Series length {len} does not match time axis length {expected}")]
    LengthMismatch { len: usize, expected: usize },

    #[error("Quantity {quantity} is not held by this timeline")]
    MissingQuantity { quantity: Quantity },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },
}
