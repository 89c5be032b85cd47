//! Object source trait and implementations.
//!
//! This module defines the [`ObjectSource`] trait, which provides a unified,
//! read-only interface over the stores an audio library lives in (local
//! filesystem, S3-compatible services, etc.).

mod filter;
mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::filter::ExtensionFilter;
pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::object::{ByteRange, ObjectHead, ObjectInfo};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;

/// Unified interface for remote object stores.
///
/// All operations are asynchronous to efficiently handle network operations
/// and concurrent access. Sources are read-only: the scanner never modifies
/// the library it is cataloguing.
///
/// # Keys
/// All keys are relative to the source root. Implementations check every
/// key they are given: filesystem-backed sources normalize it with
/// [`validate_key`](crate::validate_key), while object stores use it exactly
/// as listed after [`check_raw_key`](crate::check_raw_key).
///
/// # Examples
///
/// ```
/// use tuneshelf_storage::{ByteRange, ObjectSource, error::Result};
///
/// async fn sniff_id3(source: &dyn ObjectSource, key: &str) -> Result<bool> {
///     let header = source.get_range(key, ByteRange::new(0, 3)).await?;
///     Ok(header == b"ID3")
/// }
/// ```
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Name of the configured source (used for logging only).
    fn name(&self) -> &str;

    /// Bucket identifier that, together with an object key, uniquely
    /// identifies an object across sources. Used as part of the scan cache
    /// identity.
    fn bucket(&self) -> &str;

    /// List all objects matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream object metadata matching an optional prefix.
    ///
    /// Returns metadata for all objects in the source as a [`Stream`],
    /// yielding results incrementally. Errors for individual entries are
    /// yielded without terminating the stream where the backend allows it.
    ///
    /// # Notes
    /// - the `prefix` argument may have varying behaviour depending on the
    ///   backend: local directories match whole path segments, S3 matches
    ///   raw key prefixes.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use tuneshelf_storage::{ObjectSource, error::Result};
    /// # async fn example(source: &dyn ObjectSource) -> Result<()> {
    /// let mut stream = source.list_stream(Some("Rock"));
    /// while let Some(object) = stream.try_next().await? {
    ///     println!("{}: {} bytes ({})", object.key, object.size, object.etag);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a>;

    /// Download the complete object into `destination`, replacing its
    /// contents. Returns the number of bytes written.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn get(&self, key: &str, destination: &Path) -> Result<u64>;

    /// Read a byte range of an object.
    ///
    /// Ranges extending past the end of the object are truncated to the
    /// object size. Returns [`NotFound`](crate::error::ErrorKind::NotFound)
    /// if the object does not exist.
    async fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>>;

    /// Fetch object metadata without reading contents, `None` if the object
    /// does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectHead>>;
}
