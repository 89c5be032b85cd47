//! Extraction Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be opened or read.
    #[display("unable to read audio file: {_0}")]
    Io(#[error(not(source))] String),
    /// The container is malformed, truncated or of an unsupported type.
    #[display("unreadable audio container: {_0}")]
    Container(#[error(not(source))] String),
    /// An audio format was requested by name that this crate does not know.
    #[display("unsupported audio format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The worker process produced output that violates the wire protocol.
    #[display("worker protocol violation: {_0}")]
    WorkerProtocol(#[error(not(source))] String),
    /// The worker process reported a decoding failure.
    #[display("worker reported failure: {_0}")]
    WorkerFailed(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A file either decodes or it doesn't; only reading it can be flaky.
        matches!(self, Self::Io(_))
    }
}
