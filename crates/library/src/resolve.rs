//! Turning decoded metadata into catalog rows.

use tracing::instrument;
use tuneshelf_cache::error::Result as CacheResult;
use tuneshelf_cache::{Catalog, SongRecord, UpsertOutcome};
use tuneshelf_extract::{AudioFormat, CanonicalMetadata};
use tuneshelf_storage::ObjectInfo;

/// The smart folder an object key belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderName {
    pub path: String,
    pub is_special: bool,
}

/// Smart folder for `key`: its first directory, or its first two for
/// folders named in `special`. Keys at the root have none.
///
/// ```
/// # use tuneshelf_library::smart_folder_name;
/// let special = ["Xmas".to_string()];
/// assert_eq!(smart_folder_name("Rock/Artist/song.mp3", &special).unwrap().path, "Rock");
/// assert_eq!(smart_folder_name("Xmas/Contemporary/Artist/song.mp3", &special).unwrap().path, "Xmas/Contemporary");
/// assert_eq!(smart_folder_name("song.mp3", &special), None);
/// ```
pub fn smart_folder_name(key: &str, special: &[String]) -> Option<FolderName> {
    let mut segments: Vec<&str> = key.split('/').filter(|segment| !segment.is_empty()).collect();
    // File name.
    segments.pop()?;
    let (root, rest) = segments.split_first()?;
    if !special.iter().any(|name| name == root) {
        return Some(FolderName {
            path: root.to_string(),
            is_special: false,
        });
    }
    let path = match rest.first() {
        Some(second) => format!("{root}/{second}"),
        None => root.to_string(),
    };
    Some(FolderName { path, is_special: true })
}

/// Links a decoded object into the catalog.
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    catalog: Catalog,
    special_folders: Vec<String>,
}

impl CatalogResolver {
    pub fn new(catalog: Catalog, special_folders: Vec<String>) -> Self {
        Self {
            catalog,
            special_folders,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve artist, album and smart folder, then upsert the song keyed by
    /// its storage path.
    #[instrument(level = "debug", skip_all, fields(key = %object.key))]
    pub async fn resolve(&self, object: &ObjectInfo, metadata: &CanonicalMetadata) -> CacheResult<UpsertOutcome> {
        let artist = match non_blank(&metadata.artist) {
            Some(name) => Some(self.catalog.find_or_create_artist(name).await?),
            None => None,
        };
        let album = match non_blank(&metadata.album) {
            Some(name) => Some(self.catalog.find_or_create_album(name, artist.as_ref(), metadata.year).await?),
            None => None,
        };
        let folder = match smart_folder_name(&object.key, &self.special_folders) {
            Some(folder) => Some(self.catalog.find_or_create_smart_folder(&folder.path, folder.is_special).await?),
            None => None,
        };
        let mut record = song_record(object, metadata);
        record.artist_id = artist.map(|artist| artist.id);
        record.album_id = album.map(|album| album.id);
        record.smart_folder_id = folder.map(|folder| folder.id);
        let outcome = self.catalog.upsert_song(&record).await?;
        tracing::debug!(?outcome, "resolved song");
        Ok(outcome)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Song columns derived from the object and its metadata alone; relations
/// are left unset.
fn song_record(object: &ObjectInfo, metadata: &CanonicalMetadata) -> SongRecord {
    let format = AudioFormat::from_extension(&object.extension().unwrap_or_default());
    SongRecord {
        storage_path: object.key.clone(),
        artist_id: None,
        album_id: None,
        smart_folder_id: None,
        title: metadata.title_or_stem(&object.key),
        length: metadata.duration,
        track: metadata.track,
        disc: metadata.disc,
        year: metadata.year,
        lyrics: metadata.lyrics.clone(),
        genre: metadata.genre.clone(),
        file_hash: object.etag.clone(),
        file_size: object.size,
        mime_type: format.mime_type().to_string(),
        audio_format: format.as_str().to_string(),
        remote_etag: object.etag.clone(),
        remote_modified_at: Some(object.last_modified),
    }
}
