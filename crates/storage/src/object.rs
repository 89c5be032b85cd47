//! Object models.
//!
//! These types describe objects as the remote store reports them; the etag
//! and size pair is the change fingerprint used by the scan cache.

use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;

/// An object returned by a listing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the source root, as the source spells it
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Opaque content tag; changes whenever the content changes
    pub etag: String,
    /// Last modified timestamp
    pub last_modified: UtcDateTime,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64, etag: impl Into<String>, last_modified: UtcDateTime) -> Self {
        Self {
            key: key.into(),
            size,
            etag: etag.into(),
            last_modified,
        }
    }

    /// Lowercased extension of the key, if any.
    pub fn extension(&self) -> Option<String> {
        crate::key::extension(&self.key)
    }

    pub fn head(&self) -> ObjectHead {
        ObjectHead {
            size: self.size,
            etag: self.etag.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Object metadata without the key, as returned by [`head`](crate::ObjectSource::head).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub etag: String,
    pub last_modified: UtcDateTime,
}

/// A contiguous range of bytes within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}
impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// The first `length` bytes of an object of `total` bytes.
    pub fn header(length: u64, total: u64) -> Self {
        Self::new(0, length.min(total))
    }

    /// The last `length` bytes of an object of `total` bytes.
    pub fn footer(length: u64, total: u64) -> Self {
        let length = length.min(total);
        Self::new(total - length, length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// HTTP `Range` header value (inclusive end), `None` for empty ranges.
    pub fn http_header(&self) -> Option<String> {
        (!self.is_empty()).then(|| format!("bytes={}-{}", self.offset, self.end() - 1))
    }
}
impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}
