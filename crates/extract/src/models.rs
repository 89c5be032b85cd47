use serde::{Deserialize, Serialize};

/// Normalized metadata for one audio file, independent of its tag dialects.
///
/// Serializes to the worker wire format. Cover art is never serialized: it
/// stays in the process that decoded it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
    /// Playback length in seconds; `0.0` when unknown.
    pub duration: f64,
    /// Bits per second.
    pub bitrate: Option<u32>,
    /// Set when `duration` was inferred from bitrate and file size.
    #[serde(default)]
    pub duration_estimated: bool,
    #[serde(skip)]
    pub cover_art: Option<CoverArt>,
}

impl CanonicalMetadata {
    /// Title to store, falling back to the file stem of the object key.
    pub fn title_or_stem(&self, key: &str) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let name = key.rsplit('/').next().unwrap_or(key);
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => name.to_string(),
        }
    }

    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }
}

/// Embedded picture bytes with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: String,
}

impl std::fmt::Debug for CoverArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverArt")
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}
