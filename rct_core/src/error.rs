//! Error taxonomy for the RCT transform system.
//!
//! Lookup failures are typed so callers can distinguish "not yet known"
//! (retry or use `request_transform`) from structural failures.

use thiserror::Error;

/// Errors produced by the transform cache and its wire layer
#[derive(Debug, Error)]
pub enum RctError {
    /// The referenced frame has never been observed
    #[error("frame '{0}' is not available")]
    FrameNotAvailable(String),

    /// Both frames are known but no edge chain connects them
    #[error("no transform path from '{from}' to '{to}'")]
    NoPathAvailable { from: String, to: String },

    /// Requested time lies outside the buffered sample range
    #[error("time {requested_ms} ms outside buffered range [{oldest_ms}, {newest_ms}] ms")]
    Extrapolation {
        requested_ms: u64,
        oldest_ms: u64,
        newest_ms: u64,
    },

    /// Transport-level failure (publish, channel setup)
    #[error("transport error: {0}")]
    Transport(String),

    /// Construction-time failure, no partial object was returned
    #[error("transformer factory error: {0}")]
    Factory(String),

    /// The handle was shut down; no further operations are possible
    #[error("shutdown in progress")]
    ShutdownInProgress,

    /// Wire payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for RCT operations
pub type RctResult<T> = Result<T, RctError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RctError::FrameNotAvailable("camera".into());
        assert_eq!(err.to_string(), "frame 'camera' is not available");

        let err = RctError::NoPathAvailable {
            from: "a".into(),
            to: "b".into(),
        };
        assert!(err.to_string().contains("'a'"));
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_extrapolation_display() {
        let err = RctError::Extrapolation {
            requested_ms: 50,
            oldest_ms: 100,
            newest_ms: 200,
        };
        assert!(err.to_string().contains("50"));
        assert!(err.to_string().contains("[100, 200]"));
    }
}
