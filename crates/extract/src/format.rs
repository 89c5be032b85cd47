use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Audio container family, derived from an object key's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Flac,
    /// MPEG-4 audio: `.m4a`, `.alac`, `.mp4`.
    Mp4,
    Aac,
    Ogg,
    Opus,
    Wav,
    Aiff,
    Wma,
    Ape,
    WavPack,
    Unknown,
}

impl AudioFormat {
    /// Map a (case-insensitive) file extension, without the dot.
    pub fn from_extension(extension: &str) -> Self {
        extension.parse().unwrap_or(Self::Unknown)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
            Self::Mp4 => "audio/mp4",
            Self::Aac => "audio/aac",
            Self::Ogg => "audio/ogg",
            Self::Opus => "audio/opus",
            Self::Wav => "audio/wav",
            Self::Aiff => "audio/aiff",
            Self::Wma => "audio/x-ms-wma",
            Self::Ape => "audio/ape",
            Self::WavPack => "audio/wavpack",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Mp4 => "mp4",
            Self::Aac => "aac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Aiff => "aiff",
            Self::Wma => "wma",
            Self::Ape => "ape",
            Self::WavPack => "wavpack",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    /// Strict parse, for formats named explicitly (configuration, CLI).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Self::Mp3,
            "flac" => Self::Flac,
            "m4a" | "mp4" | "alac" => Self::Mp4,
            "aac" => Self::Aac,
            "ogg" | "oga" => Self::Ogg,
            "opus" => Self::Opus,
            "wav" | "wave" => Self::Wav,
            "aiff" | "aif" => Self::Aiff,
            "wma" => Self::Wma,
            "ape" => Self::Ape,
            "wv" | "wavpack" => Self::WavPack,
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        };
        Ok(format)
    }
}
