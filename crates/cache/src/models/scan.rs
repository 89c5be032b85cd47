use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Identity hash for an object: BLAKE3 of `bucket NUL key`, hex encoded.
pub fn key_hash(bucket: &str, key: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(bucket.as_bytes());
    hasher.update(&[0]);
    hasher.update(key.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Last known fingerprint of one object.
///
/// A fresh entry has no fingerprint, so its first [`has_changed`] check is
/// always `true`.
///
/// [`has_changed`]: ScanCacheEntry::has_changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCacheEntry {
    pub bucket: String,
    pub object_key: String,
    pub key_hash: String,
    pub etag: Option<String>,
    pub size: Option<u64>,
    pub last_modified: Option<UtcDateTime>,
    pub last_scanned_at: Option<UtcDateTime>,
}

impl ScanCacheEntry {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let object_key = object_key.into();
        Self {
            key_hash: key_hash(&bucket, &object_key),
            bucket,
            object_key,
            etag: None,
            size: None,
            last_modified: None,
            last_scanned_at: None,
        }
    }

    /// Whether the object differs from the stored fingerprint.
    pub fn has_changed(&self, etag: &str, size: u64) -> bool {
        match (&self.etag, self.size) {
            (Some(known_etag), Some(known_size)) => known_etag != etag || known_size != size,
            _ => true,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ScanCacheRow {
    pub(crate) bucket: String,
    pub(crate) object_key: String,
    pub(crate) key_hash: String,
    pub(crate) etag: Option<String>,
    pub(crate) size: Option<i64>,
    pub(crate) last_modified: Option<i64>,
    pub(crate) last_scanned_at: Option<i64>,
}

pub(crate) fn from_timestamp(value: Option<i64>, what: &'static str) -> Result<Option<UtcDateTime>, Error> {
    value
        .map(|ts| UtcDateTime::from_unix_timestamp(ts).or_raise(|| ErrorKind::InvalidData(what)))
        .transpose()
}

impl TryFrom<ScanCacheRow> for ScanCacheEntry {
    type Error = Error;
    fn try_from(row: ScanCacheRow) -> Result<Self, Self::Error> {
        Ok(Self {
            bucket: row.bucket,
            object_key: row.object_key,
            key_hash: row.key_hash,
            etag: row.etag,
            size: row
                .size
                .map(|size| u64::try_from(size).or_raise(|| ErrorKind::InvalidData("object size")))
                .transpose()?,
            last_modified: from_timestamp(row.last_modified, "last modified date")?,
            last_scanned_at: from_timestamp(row.last_scanned_at, "last scanned date")?,
        })
    }
}
