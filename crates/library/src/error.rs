//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Only run-level failures surface as these; per-file
//! failures are folded into [`FileReport`](crate::scan::FileReport)s.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The run could not be prepared (staging directory unusable, catalog
    /// unreachable).
    #[display("unable to prepare scan")]
    Setup,
    /// The object listing could not be started.
    #[display("unable to list objects")]
    Listing,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Listing failures are usually the network; setup failures are config.
        matches!(self, Self::Listing)
    }
}
