//! Frames and wait results.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One acquired image.
///
/// The payload is opaque to the acquisition core; decoding is the consumer's
/// business. `Bytes` keeps hand-off between threads cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Device-side frame counter, starting at 1.
    pub sequence: u64,
    /// Time the acquisition finished.
    pub timestamp: DateTime<Utc>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Raw image data.
    pub payload: Bytes,
}

impl Frame {
    /// Timestamp as nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Outcome of a bounded frame wait.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult {
    /// A frame was delivered.
    Frame(Frame),
    /// Nothing arrived within the wait bound. Not an error.
    Timeout,
}

impl FrameResult {
    /// Whether the wait ended without a frame.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameResult::Timeout)
    }

    /// The delivered frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FrameResult::Frame(frame) => Some(frame),
            FrameResult::Timeout => None,
        }
    }
}
