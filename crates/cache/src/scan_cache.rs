//! Scan cache repository: the per-object change ledger.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{ScanCacheEntry, ScanCacheRow, key_hash};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Repository over the `scan_cache` table.
///
/// Writes are last-write-wins. With `dry_run` set every write is a no-op
/// (entries that would be created are returned unsaved).
#[derive(Debug, Clone)]
pub struct ScanCache {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for ScanCache {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl ScanCache {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Read an entry without creating it.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Option<ScanCacheEntry>> {
        let row: Option<ScanCacheRow> = sqlx::query_as(include_str!("../queries/scan_cache_get.sql"))
            .bind(bucket)
            .bind(key_hash(bucket, key))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(ScanCacheEntry::try_from).transpose()
    }

    /// Return the entry for an object, creating an empty one on first sight.
    ///
    /// Safe to race: concurrent callers all end up with the same row.
    pub async fn find_or_create_for_key(&self, bucket: &str, key: &str) -> Result<ScanCacheEntry> {
        if let Some(entry) = self.get(bucket, key).await? {
            return Ok(entry);
        }
        let entry = ScanCacheEntry::new(bucket, key);
        if self.dry_run {
            return Ok(entry);
        }
        sqlx::query(include_str!("../queries/scan_cache_insert.sql"))
            .bind(&entry.bucket)
            .bind(&entry.object_key)
            .bind(&entry.key_hash)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::trace!(bucket, key, "created scan cache entry");
        self.get(bucket, key)
            .await?
            .ok_or_raise(|| ErrorKind::Vanished(format!("scan cache entry {bucket}/{key}")))
    }

    /// Record that the object was looked at, leaving its fingerprint alone.
    pub async fn mark_scanned(&self, entry: &mut ScanCacheEntry) -> Result<()> {
        let now = UtcDateTime::now();
        if !self.dry_run {
            sqlx::query(include_str!("../queries/scan_cache_mark_scanned.sql"))
                .bind(now.unix_timestamp())
                .bind(&entry.bucket)
                .bind(&entry.key_hash)
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        entry.last_scanned_at = Some(now);
        Ok(())
    }

    /// Commit the fingerprint an object was successfully processed at.
    pub async fn update_from_scan(
        &self,
        entry: &mut ScanCacheEntry,
        etag: &str,
        size: u64,
        last_modified: Option<UtcDateTime>,
    ) -> Result<()> {
        let now = UtcDateTime::now();
        if !self.dry_run {
            let stored_size = i64::try_from(size).or_raise(|| ErrorKind::InvalidData("object size"))?;
            sqlx::query(include_str!("../queries/scan_cache_update.sql"))
                .bind(&entry.bucket)
                .bind(&entry.object_key)
                .bind(&entry.key_hash)
                .bind(etag)
                .bind(stored_size)
                .bind(last_modified.map(|at| at.unix_timestamp()))
                .bind(now.unix_timestamp())
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        entry.etag = Some(etag.to_string());
        entry.size = Some(size);
        entry.last_modified = last_modified;
        entry.last_scanned_at = Some(now);
        Ok(())
    }

    /// Number of entries recorded for a bucket.
    pub async fn count(&self, bucket: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/scan_cache_count.sql"))
            .bind(bucket)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }
}
