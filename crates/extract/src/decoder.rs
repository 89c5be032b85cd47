use crate::dialect::{self, Field};
use crate::duration;
use crate::error::{ErrorKind, Result};
use crate::format::AudioFormat;
use crate::models::CanonicalMetadata;
use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{AudioFile, FileType, TaggedFile};
use lofty::probe::Probe;
use std::path::Path;
use tracing::instrument;

/// Reads a local audio file into [`CanonicalMetadata`].
#[derive(Debug, Clone, Copy)]
pub struct TagDecoder {
    options: ParseOptions,
    /// Container to assume instead of sniffing the file.
    file_type: Option<FileType>,
}

impl Default for TagDecoder {
    fn default() -> Self {
        Self::new(ParseOptions::new().parsing_mode(ParsingMode::BestAttempt))
    }
}

impl TagDecoder {
    pub fn new(options: ParseOptions) -> Self {
        Self { options, file_type: None }
    }

    /// Skip content sniffing and read the file as `format`.
    ///
    /// Fails straight away for formats there is no container reader for.
    pub fn with_format(mut self, format: AudioFormat) -> Result<Self> {
        let file_type = match format {
            AudioFormat::Mp3 => FileType::Mpeg,
            AudioFormat::Flac => FileType::Flac,
            AudioFormat::Mp4 => FileType::Mp4,
            AudioFormat::Aac => FileType::Aac,
            AudioFormat::Ogg => FileType::Vorbis,
            AudioFormat::Opus => FileType::Opus,
            AudioFormat::Wav => FileType::Wav,
            AudioFormat::Aiff => FileType::Aiff,
            AudioFormat::Ape => FileType::Ape,
            AudioFormat::WavPack => FileType::WavPack,
            AudioFormat::Wma | AudioFormat::Unknown => {
                exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()))
            },
        };
        self.file_type = Some(file_type);
        Ok(self)
    }

    /// Decode without any knowledge of the object's real size; a missing
    /// duration stays missing.
    pub fn decode(&self, path: &Path) -> Result<CanonicalMetadata> {
        self.decode_with_size_hint(path, None)
    }

    /// Decode, estimating a missing duration from the bitrate and
    /// `size_hint` (the real object size) when one is given.
    #[instrument(level = "debug", skip_all, fields(path = %path.display(), ?size_hint))]
    pub fn decode_with_size_hint(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata> {
        let file = self.read(path)?;
        let mut metadata = Self::canonicalize(&file);
        duration::apply(&mut metadata, size_hint);
        tracing::debug!(
            duration = metadata.duration,
            bitrate = ?metadata.bitrate,
            estimated = metadata.duration_estimated,
            "decoded audio file"
        );
        Ok(metadata)
    }

    fn read(&self, path: &Path) -> Result<TaggedFile> {
        let io = |e: &dyn std::fmt::Display| exn::Exn::from(ErrorKind::Io(format!("{}: {e}", path.display())));
        let mut reader = Probe::open(path).map_err(|e| io(&e))?.options(self.options);
        match self.file_type {
            Some(file_type) => reader.set_file_type(file_type),
            None => reader = reader.guess_file_type().map_err(|e| io(&e))?,
        }
        reader
            .read()
            .map_err(|e| exn::Exn::from(ErrorKind::Container(format!("{}: {e}", path.display()))))
    }

    fn canonicalize(file: &TaggedFile) -> CanonicalMetadata {
        let properties = file.properties();
        let bitrate = properties
            .audio_bitrate()
            .filter(|kbps| *kbps > 0)
            .or_else(|| properties.overall_bitrate().filter(|kbps| *kbps > 0))
            .map(|kbps| kbps.saturating_mul(1000));

        CanonicalMetadata {
            title: Field::Title.text(file),
            artist: Field::Artist.text(file),
            album: Field::Album.text(file),
            year: Field::Year.number(file),
            track: Field::Track.number(file),
            disc: Field::Disc.number(file),
            genre: Field::Genre.text(file),
            lyrics: Field::Lyrics.text(file),
            duration: properties.duration().as_secs_f64(),
            bitrate,
            duration_estimated: false,
            cover_art: dialect::cover_art(file),
        }
    }
}
