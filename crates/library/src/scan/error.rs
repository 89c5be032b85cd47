//! Error types for the [`scan`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a per-file scan failure.
///
/// Each variant identifies the subsystem that failed, allowing callers to
/// inspect the error tree without matching on opaque strings.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A scan cache lookup failed.
    #[display("scan cache lookup failed")]
    Cache,
    /// No input or placement produced metadata.
    #[display("metadata extraction failed: {_0}")]
    Extraction(#[error(not(source))] String),
    /// Linking the metadata into the catalog failed.
    #[display("catalog resolution failed")]
    Catalog,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache)
    }
}
