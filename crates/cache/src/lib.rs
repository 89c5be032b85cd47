//! SQLite persistence for tuneshelf.
//!
//! Two independent stores share one database file:
//! - the **scan cache**, a change ledger keyed by (bucket, object key) that
//!   remembers the last fingerprint (etag + size) each object was processed
//!   at, so unchanged objects are never downloaded again;
//! - the **catalog** of artists, albums, smart folders and songs.
//!
//! Neither references the other. A cache entry may exist without a song (the
//! extraction failed) and a scan never deletes either.

mod catalog;
mod db;
pub mod error;
mod models;
mod scan_cache;

pub use crate::catalog::Catalog;
pub use crate::db::Database;
pub use crate::models::{
    Album, Artist, ScanCacheEntry, SmartFolder, Song, SongRecord, UpsertOutcome, key_hash, normalize_name,
};
pub use crate::scan_cache::ScanCache;

pub(crate) fn now() -> i64 {
    time::UtcDateTime::now().unix_timestamp()
}
