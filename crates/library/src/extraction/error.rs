//! Error types for the [`extraction`](super) module.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an extraction failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Staging`]
/// - [`ErrorKind::Timeout`]
/// - [`ErrorKind::Interrupted`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Decode`]
/// - [`ErrorKind::Worker`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fetching bytes from the object source failed.
    #[display("unable to fetch object bytes")]
    Storage,
    /// A temporary file could not be created or written.
    #[display("unable to stage temporary file: {_0}")]
    Staging(#[error(not(source))] String),
    /// The in-process decoder failed (or panicked).
    #[display("in-process decoding failed")]
    Decode,
    /// The isolated worker could not be launched, exited unsuccessfully or
    /// broke the wire protocol.
    #[display("isolated worker failed: {_0}")]
    Worker(#[error(not(source))] String),
    /// The isolated worker exceeded its wall-clock budget and was killed.
    #[display("isolated worker timed out after {_0}s")]
    Timeout(#[error(not(source))] u64),
    /// Cancellation prevented a worker launch.
    #[display("interrupted before the isolated worker was launched")]
    Interrupted,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Timeout(_))
    }
}
