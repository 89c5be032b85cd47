mod catalog;
mod scan;

pub use self::catalog::{Album, Artist, SmartFolder, Song, SongRecord, UpsertOutcome, normalize_name};
pub(crate) use self::catalog::{SongColumns, SongRow};
pub use self::scan::{ScanCacheEntry, key_hash};
pub(crate) use self::scan::ScanCacheRow;
