//! Fixed-layout binary blobs written by the simulator.
//!
//! ## Coordinate blob (60 bytes)
//!
//! ```text
//! offset  0..6    header bytes, ignored
//! offset  6..14   x   (f64 LE)
//! offset 14..22   y   (f64 LE)
//! offset 22..30   x   (copy)
//! offset 30..38   y   (copy)
//! offset 43..51   x   (copy)
//! offset 51..59   y   (copy)
//! ```
//!
//! Decoding reads only the first pair. Encoding writes all three because the
//! simulator's own reader expects them.
//!
//! ## Time series blob
//!
//! ```text
//! offset 0..4     count (u32 LE)
//! then (len - 4) / 16 records:
//!   0..8          ticks (i64 LE, 100 ns units since 0001-01-01)
//!   8..16         value (f64 LE)
//! ```

use chrono::{DateTime, Utc};

use crate::{ResultsError, ResultsResult};

/// Size of an encoded coordinate blob.
pub const COORDINATE_BLOB_LEN: usize = 60;

const COORDINATE_OFFSETS: [(usize, usize); 3] = [(6, 14), (22, 30), (43, 51)];

const SERIES_HEADER_LEN: usize = 4;
const SERIES_RECORD_LEN: usize = 16;

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_MS: i64 = 10_000;
/// Fixed one-hour correction present in every stored timestamp.
const STORED_OFFSET_MS: i64 = 3_600_000;

/// One sample of an irregular series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    /// Unix milliseconds.
    pub timestamp_ms: i64,
    pub value: f64,
}

impl TimedValue {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// Stored tick value to Unix milliseconds.
pub fn ticks_to_ms(raw: i64) -> i64 {
    (raw - UNIX_EPOCH_TICKS) / TICKS_PER_MS - STORED_OFFSET_MS
}

/// Unix milliseconds to the stored tick value.
pub fn ms_to_ticks(ms: i64) -> i64 {
    (ms + STORED_OFFSET_MS) * TICKS_PER_MS + UNIX_EPOCH_TICKS
}

fn read_f64(bytes: &[u8], at: usize) -> ResultsResult<f64> {
    bytes
        .get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .map(f64::from_le_bytes)
        .ok_or_else(|| ResultsError::MalformedBlob {
            what: format!("need 8 bytes at offset {at}, blob has {}", bytes.len()),
        })
}

fn read_i64(bytes: &[u8], at: usize) -> ResultsResult<i64> {
    bytes
        .get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .map(i64::from_le_bytes)
        .ok_or_else(|| ResultsError::MalformedBlob {
            what: format!("need 8 bytes at offset {at}, blob has {}", bytes.len()),
        })
}

/// Decode a coordinate blob into `(x, y)`.
pub fn decode_coordinate(bytes: &[u8]) -> ResultsResult<(f64, f64)> {
    let (x_at, y_at) = COORDINATE_OFFSETS[0];
    Ok((read_f64(bytes, x_at)?, read_f64(bytes, y_at)?))
}

/// Encode a coordinate into the 60-byte redundant layout.
pub fn encode_coordinate(x: f64, y: f64) -> Vec<u8> {
    let mut buf = vec![0_u8; COORDINATE_BLOB_LEN];
    for (x_at, y_at) in COORDINATE_OFFSETS {
        buf[x_at..x_at + 8].copy_from_slice(&x.to_le_bytes());
        buf[y_at..y_at + 8].copy_from_slice(&y.to_le_bytes());
    }
    buf
}

/// Decode an irregular time series blob.
///
/// The record count is derived from the blob length; the header count is
/// not trusted. Trailing bytes short of a full record are ignored.
pub fn decode_time_series(bytes: &[u8]) -> ResultsResult<Vec<TimedValue>> {
    if bytes.len() < SERIES_HEADER_LEN {
        return Err(ResultsError::MalformedBlob {
            what: format!("series blob of {} bytes has no header", bytes.len()),
        });
    }
    let count = (bytes.len() - SERIES_HEADER_LEN) / SERIES_RECORD_LEN;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let at = SERIES_HEADER_LEN + i * SERIES_RECORD_LEN;
        let raw = read_i64(bytes, at)?;
        if raw < 0 {
            return Err(ResultsError::MalformedBlob {
                what: format!("negative tick value {raw} in record {i}"),
            });
        }
        let value = read_f64(bytes, at + 8)?;
        out.push(TimedValue::new(ticks_to_ms(raw), value));
    }
    Ok(out)
}

/// Encode an irregular time series blob.
pub fn encode_time_series(values: &[TimedValue]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SERIES_HEADER_LEN + values.len() * SERIES_RECORD_LEN);
    buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for tv in values {
        buf.extend_from_slice(&ms_to_ticks(tv.timestamp_ms).to_le_bytes());
        buf.extend_from_slice(&tv.value.to_le_bytes());
    }
    buf
}
