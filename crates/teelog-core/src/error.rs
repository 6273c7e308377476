//! Error types for the teelog pipeline

use thiserror::Error;

/// Invalid configuration detected while building a [`Logger`](crate::Logger).
///
/// Construction errors are fatal: no partially built pipeline is ever
/// returned alongside one.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// Level name could not be parsed
    #[error("Unrecognized level: {0:?}")]
    InvalidLevel(String),

    /// Timestamp layout contains an invalid strftime directive
    #[error("Invalid timestamp format: {0:?}")]
    InvalidTimeFormat(String),

    /// A rotation option was given a negative value
    #[error("{option} cannot be less than zero (got {value})")]
    Negative { option: &'static str, value: i64 },

    /// A hook was requested but no forwarder was supplied
    #[error("Hook requested without a forwarder")]
    MissingForwarder,

    /// Startup rotation of the log file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Field data that the encoder cannot serialize.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// A field value failed to serialize when the field was built
    #[error("Field {key:?} is not serializable: {reason}")]
    Field { key: String, reason: String },

    /// The encoded buffer is not the structured form the reader expected
    #[error("Malformed encoded entry: {0}")]
    Malformed(String),
}

/// Failure reported by an external forwarding transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// Transport failed to deliver the line
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote side refused the line
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Bounded queue was full and the line was dropped
    #[error("Forwarding queue full, line dropped")]
    Backpressure,

    /// Forwarding worker has shut down
    #[error("Forwarder closed")]
    Closed,
}

/// Per-sink write failure.
///
/// These never reach the log call site; the dispatcher hands them to the
/// [`ErrorReporter`](crate::diagnostics::ErrorReporter).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Forwarding error: {0}")]
    Forwarding(#[from] ForwardError),
}

/// Result type alias for pipeline construction
pub type BuildResult<T> = Result<T, ConstructionError>;

/// Result type alias for per-sink operations
pub type SinkResult<T> = Result<T, SinkError>;
