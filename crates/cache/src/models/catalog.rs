use crate::error::{Error, ErrorKind};
use crate::models::scan::from_timestamp;
use exn::ResultExt;
use time::UtcDateTime;

/// Slug-style identity for names: lowercase, diacritics folded, punctuation
/// collapsed. Names that slugify to nothing fall back to their trimmed
/// lowercase form so they still get an identity.
pub fn normalize_name(name: &str) -> String {
    let slug: String = rslug::slugify!(name.trim());
    if slug.is_empty() {
        name.trim().to_lowercase()
    } else {
        slug
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub artist_id: Option<i64>,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SmartFolder {
    pub id: i64,
    pub name: String,
    pub path_prefix: String,
    pub depth: i64,
    pub is_special: bool,
    pub parent_id: Option<i64>,
}

/// Everything the resolver knows about a song, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub storage_path: String,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub smart_folder_id: Option<i64>,
    pub title: String,
    /// Seconds.
    pub length: f64,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub year: Option<u32>,
    pub lyrics: Option<String>,
    pub genre: Option<String>,
    pub file_hash: String,
    pub file_size: u64,
    pub mime_type: String,
    pub audio_format: String,
    pub remote_etag: String,
    pub remote_modified_at: Option<UtcDateTime>,
}

/// A persisted song.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: i64,
    pub normalized_title: String,
    pub record: SongRecord,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// What [`Catalog::upsert_song`](crate::Catalog::upsert_song) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertOutcome {
    New,
    Updated,
    /// The stored row already held identical values; nothing was written.
    Unchanged,
}

/// Column values of a song, as compared and bound.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SongColumns {
    pub(crate) storage_path: String,
    pub(crate) artist_id: Option<i64>,
    pub(crate) album_id: Option<i64>,
    pub(crate) smart_folder_id: Option<i64>,
    pub(crate) title: String,
    pub(crate) normalized_title: String,
    pub(crate) length: f64,
    pub(crate) track: Option<i64>,
    pub(crate) disc: Option<i64>,
    pub(crate) year: Option<i64>,
    pub(crate) lyrics: Option<String>,
    pub(crate) genre: Option<String>,
    pub(crate) file_hash: String,
    pub(crate) file_size: i64,
    pub(crate) mime_type: String,
    pub(crate) audio_format: String,
    pub(crate) remote_etag: String,
    pub(crate) remote_modified_at: Option<i64>,
}

impl TryFrom<&SongRecord> for SongColumns {
    type Error = Error;
    fn try_from(record: &SongRecord) -> Result<Self, Self::Error> {
        // Non-finite lengths would never compare equal and defeat `Unchanged`.
        let length = if record.length.is_finite() && record.length > 0.0 {
            record.length
        } else {
            0.0
        };
        Ok(Self {
            storage_path: record.storage_path.clone(),
            artist_id: record.artist_id,
            album_id: record.album_id,
            smart_folder_id: record.smart_folder_id,
            title: record.title.clone(),
            normalized_title: normalize_name(&record.title),
            length,
            track: record.track.map(i64::from),
            disc: record.disc.map(i64::from),
            year: record.year.map(i64::from),
            lyrics: record.lyrics.clone(),
            genre: record.genre.clone(),
            file_hash: record.file_hash.clone(),
            file_size: i64::try_from(record.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mime_type: record.mime_type.clone(),
            audio_format: record.audio_format.clone(),
            remote_etag: record.remote_etag.clone(),
            remote_modified_at: record.remote_modified_at.map(|at| at.unix_timestamp()),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SongRow {
    pub(crate) id: i64,
    pub(crate) storage_path: String,
    pub(crate) artist_id: Option<i64>,
    pub(crate) album_id: Option<i64>,
    pub(crate) smart_folder_id: Option<i64>,
    pub(crate) title: String,
    pub(crate) normalized_title: String,
    pub(crate) length: f64,
    pub(crate) track: Option<i64>,
    pub(crate) disc: Option<i64>,
    pub(crate) year: Option<i64>,
    pub(crate) lyrics: Option<String>,
    pub(crate) genre: Option<String>,
    pub(crate) file_hash: String,
    pub(crate) file_size: i64,
    pub(crate) mime_type: String,
    pub(crate) audio_format: String,
    pub(crate) remote_etag: String,
    pub(crate) remote_modified_at: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl SongRow {
    pub(crate) fn columns(&self) -> SongColumns {
        SongColumns {
            storage_path: self.storage_path.clone(),
            artist_id: self.artist_id,
            album_id: self.album_id,
            smart_folder_id: self.smart_folder_id,
            title: self.title.clone(),
            normalized_title: self.normalized_title.clone(),
            length: self.length,
            track: self.track,
            disc: self.disc,
            year: self.year,
            lyrics: self.lyrics.clone(),
            genre: self.genre.clone(),
            file_hash: self.file_hash.clone(),
            file_size: self.file_size,
            mime_type: self.mime_type.clone(),
            audio_format: self.audio_format.clone(),
            remote_etag: self.remote_etag.clone(),
            remote_modified_at: self.remote_modified_at,
        }
    }
}

fn to_u32(value: Option<i64>, what: &'static str) -> Result<Option<u32>, Error> {
    value
        .map(|v| u32::try_from(v).or_raise(|| ErrorKind::InvalidData(what)))
        .transpose()
}

impl TryFrom<SongRow> for Song {
    type Error = Error;
    fn try_from(row: SongRow) -> Result<Self, Self::Error> {
        let created_at = from_timestamp(Some(row.created_at), "created date")?;
        let updated_at = from_timestamp(Some(row.updated_at), "updated date")?;
        let record = SongRecord {
            storage_path: row.storage_path,
            artist_id: row.artist_id,
            album_id: row.album_id,
            smart_folder_id: row.smart_folder_id,
            title: row.title,
            length: row.length,
            track: to_u32(row.track, "track number")?,
            disc: to_u32(row.disc, "disc number")?,
            year: to_u32(row.year, "year")?,
            lyrics: row.lyrics,
            genre: row.genre,
            file_hash: row.file_hash,
            file_size: u64::try_from(row.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mime_type: row.mime_type,
            audio_format: row.audio_format,
            remote_etag: row.remote_etag,
            remote_modified_at: from_timestamp(row.remote_modified_at, "remote modified date")?,
        };
        Ok(Self {
            id: row.id,
            normalized_title: row.normalized_title,
            record,
            created_at: created_at.unwrap_or(UtcDateTime::UNIX_EPOCH),
            updated_at: updated_at.unwrap_or(UtcDateTime::UNIX_EPOCH),
        })
    }
}
