//! Catalog repository: artists, albums, smart folders and songs.
//!
//! Identities (normalized artist name, normalized album name + artist,
//! folder path prefix) are unique in the schema. Creation takes an
//! optimistic read first, then inserts with `ON CONFLICT DO NOTHING` and
//! re-reads inside one transaction, so racing workers converge on the row
//! that won.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Album, Artist, SmartFolder, Song, SongColumns, SongRecord, SongRow, UpsertOutcome, normalize_name};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}
impl From<&Database> for Catalog {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Artists
    // =========================================================================

    pub async fn artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        sqlx::query_as(include_str!("../queries/artist_get.sql"))
            .bind(normalize_name(name))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Find an artist by normalized name, creating it under `name` if absent.
    pub async fn find_or_create_artist(&self, name: &str) -> Result<Artist> {
        let name = name.trim();
        let normalized = normalize_name(name);
        if let Some(artist) = self.artist_by_name(name).await? {
            return Ok(artist);
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/artist_insert.sql"))
            .bind(name)
            .bind(&normalized)
            .bind(crate::now())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let artist: Option<Artist> = sqlx::query_as(include_str!("../queries/artist_get.sql"))
            .bind(&normalized)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let artist = artist.ok_or_raise(|| ErrorKind::Vanished(format!("artist {normalized}")))?;
        tracing::debug!(id = artist.id, name = %artist.name, "artist resolved");
        Ok(artist)
    }

    // =========================================================================
    // Albums
    // =========================================================================

    pub async fn album_by_name(&self, name: &str, artist: Option<&Artist>) -> Result<Option<Album>> {
        sqlx::query_as(include_str!("../queries/album_get.sql"))
            .bind(normalize_name(name))
            .bind(artist.map(|a| a.id))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Find an album by normalized name and artist, creating it if absent.
    ///
    /// A `year` fills in an album that has none; it never overwrites one.
    pub async fn find_or_create_album(&self, name: &str, artist: Option<&Artist>, year: Option<u32>) -> Result<Album> {
        let name = name.trim();
        let normalized = normalize_name(name);
        let artist_id = artist.map(|a| a.id);
        let year = year.map(i64::from);

        if let Some(mut album) = self.album_by_name(name, artist).await? {
            if album.year.is_none()
                && let Some(year) = year
            {
                sqlx::query(include_str!("../queries/album_set_year.sql"))
                    .bind(year)
                    .bind(album.id)
                    .execute(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                album.year = Some(year);
            }
            return Ok(album);
        }

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/album_insert.sql"))
            .bind(name)
            .bind(&normalized)
            .bind(artist_id)
            .bind(year)
            .bind(crate::now())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let album: Option<Album> = sqlx::query_as(include_str!("../queries/album_get.sql"))
            .bind(&normalized)
            .bind(artist_id)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let album = album.ok_or_raise(|| ErrorKind::Vanished(format!("album {normalized}")))?;
        tracing::debug!(id = album.id, name = %album.name, ?artist_id, "album resolved");
        Ok(album)
    }

    // =========================================================================
    // Smart folders
    // =========================================================================

    pub async fn smart_folder_by_prefix(&self, path_prefix: &str) -> Result<Option<SmartFolder>> {
        sqlx::query_as(include_str!("../queries/smart_folder_get.sql"))
            .bind(path_prefix)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Find or create the folder for a `/`-separated path prefix.
    ///
    /// Two-segment special folders (`Xmas/Contemporary`) get their one-segment
    /// root (`Xmas`) as parent, which is created on demand and flagged
    /// special as well.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_or_create_smart_folder(&self, path_prefix: &str, is_special: bool) -> Result<SmartFolder> {
        if let Some(folder) = self.smart_folder_by_prefix(path_prefix).await? {
            return Ok(folder);
        }
        let segments: Vec<&str> = path_prefix.split('/').filter(|s| !s.is_empty()).collect();
        let parent_id = match segments.as_slice() {
            [root, _, ..] if is_special => {
                let root = match self.smart_folder_by_prefix(root).await? {
                    Some(folder) => folder,
                    None => self.insert_smart_folder(root, 1, true, None).await?,
                };
                Some(root.id)
            },
            _ => None,
        };
        let depth = i64::try_from(segments.len()).or_raise(|| ErrorKind::InvalidData("folder depth"))?;
        self.insert_smart_folder(path_prefix, depth, is_special, parent_id).await
    }

    async fn insert_smart_folder(
        &self,
        path_prefix: &str,
        depth: i64,
        is_special: bool,
        parent_id: Option<i64>,
    ) -> Result<SmartFolder> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/smart_folder_insert.sql"))
            .bind(path_prefix)
            .bind(path_prefix)
            .bind(depth)
            .bind(is_special)
            .bind(parent_id)
            .bind(crate::now())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let folder: Option<SmartFolder> = sqlx::query_as(include_str!("../queries/smart_folder_get.sql"))
            .bind(path_prefix)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        folder.ok_or_raise(|| ErrorKind::Vanished(format!("smart folder {path_prefix}")))
    }

    // =========================================================================
    // Songs
    // =========================================================================

    pub async fn song_by_path(&self, storage_path: &str) -> Result<Option<Song>> {
        let row: Option<SongRow> = sqlx::query_as(include_str!("../queries/song_get_by_path.sql"))
            .bind(storage_path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Song::try_from).transpose()
    }

    /// Insert or update the song at `record.storage_path`.
    ///
    /// Nothing is written when the stored row already holds identical values.
    #[instrument(level = "debug", skip_all, fields(path = %record.storage_path))]
    pub async fn upsert_song(&self, record: &SongRecord) -> Result<UpsertOutcome> {
        let columns = SongColumns::try_from(record)?;
        let existing: Option<SongRow> = sqlx::query_as(include_str!("../queries/song_get_by_path.sql"))
            .bind(&columns.storage_path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let outcome = match &existing {
            Some(row) if row.columns() == columns => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::New,
        };
        let now = crate::now();
        sqlx::query(include_str!("../queries/song_upsert.sql"))
            .bind(columns.storage_path)
            .bind(columns.artist_id)
            .bind(columns.album_id)
            .bind(columns.smart_folder_id)
            .bind(columns.title)
            .bind(columns.normalized_title)
            .bind(columns.length)
            .bind(columns.track)
            .bind(columns.disc)
            .bind(columns.year)
            .bind(columns.lyrics)
            .bind(columns.genre)
            .bind(columns.file_hash)
            .bind(columns.file_size)
            .bind(columns.mime_type)
            .bind(columns.audio_format)
            .bind(columns.remote_etag)
            .bind(columns.remote_modified_at)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::trace!(?outcome, "song written");
        Ok(outcome)
    }

    // =========================================================================
    // Counts
    // =========================================================================

    async fn count(&self, query: &'static str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(query)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    pub async fn count_artists(&self) -> Result<u64> {
        self.count(include_str!("../queries/count_artists.sql")).await
    }

    pub async fn count_albums(&self) -> Result<u64> {
        self.count(include_str!("../queries/count_albums.sql")).await
    }

    pub async fn count_smart_folders(&self) -> Result<u64> {
        self.count(include_str!("../queries/count_smart_folders.sql")).await
    }

    pub async fn count_songs(&self) -> Result<u64> {
        self.count(include_str!("../queries/count_songs.sql")).await
    }
}
