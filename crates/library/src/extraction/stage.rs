//! Staging objects as local files the decoders can open.
//!
//! A partial stage is a sparse file of the object's real length holding only
//! its header and footer ranges; tag blocks and container indexes live at
//! the ends of audio files, so that is usually enough. A full stage is the
//! whole object. Either way the file is named with the object's extension
//! and removed when the [`StagedFile`] is dropped.

use crate::extraction::error::{ErrorKind, Result};
use crate::extraction::strategy::InputMode;
use exn::ResultExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;
use tuneshelf_config::ExtractionConfig;
use tuneshelf_storage::{ByteRange, ObjectInfo, SourceHandle};

const PREFIX: &str = "tuneshelf-";

/// A local copy of (part of) an object.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    input: InputMode,
    size_hint: Option<u64>,
}
impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input(&self) -> InputMode {
        self.input
    }

    /// Real size of the object as listed by the source. Both stages carry
    /// it: the reconstructed file has the same length but mostly zeroes.
    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }
}

#[derive(Clone)]
pub struct Stager {
    source: SourceHandle,
    header_bytes: u64,
    footer_bytes: u64,
    temp_dir: PathBuf,
}

impl Stager {
    pub fn new(source: SourceHandle, config: &ExtractionConfig) -> Self {
        Self {
            source,
            header_bytes: config.header_bytes,
            footer_bytes: config.footer_bytes,
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Fail early if temporary files cannot be created at all.
    pub fn check(&self) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempfile_in(&self.temp_dir)
            .or_raise(|| ErrorKind::Staging(self.temp_dir.display().to_string()))?;
        drop(scratch);
        Ok(())
    }

    pub async fn stage(&self, object: &ObjectInfo, input: InputMode) -> Result<StagedFile> {
        match input {
            InputMode::Partial => self.reconstruct(object).await,
            InputMode::Full => self.download(object).await,
        }
    }

    /// Build a sparse stand-in from the header and footer ranges.
    #[instrument(level = "debug", skip_all, fields(key = %object.key, size = object.size))]
    pub async fn reconstruct(&self, object: &ObjectInfo) -> Result<StagedFile> {
        let header = ByteRange::header(self.header_bytes, object.size);
        // Never overlap the header.
        let footer = ByteRange::footer(self.footer_bytes.min(object.size - header.length), object.size);

        let header_data = self.source.get_range(&object.key, header).await.or_raise(|| ErrorKind::Storage)?;
        let footer_data = if footer.is_empty() {
            Vec::new()
        } else {
            self.source.get_range(&object.key, footer).await.or_raise(|| ErrorKind::Storage)?
        };

        let path = self.temp_path(object)?;
        let staging = || ErrorKind::Staging(path.display().to_string());
        let mut file = OpenOptions::new().write(true).open(&path).await.or_raise(staging)?;
        file.set_len(object.size).await.or_raise(staging)?;
        file.write_all(&header_data).await.or_raise(staging)?;
        if !footer_data.is_empty() {
            file.seek(SeekFrom::Start(footer.offset)).await.or_raise(staging)?;
            file.write_all(&footer_data).await.or_raise(staging)?;
        }
        file.flush().await.or_raise(staging)?;
        tracing::debug!(%header, %footer, "reconstructed partial file");
        Ok(StagedFile {
            path,
            input: InputMode::Partial,
            size_hint: Some(object.size),
        })
    }

    /// Download the whole object.
    #[instrument(level = "debug", skip_all, fields(key = %object.key, size = object.size))]
    pub async fn download(&self, object: &ObjectInfo) -> Result<StagedFile> {
        let path = self.temp_path(object)?;
        let written = self.source.get(&object.key, &path).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(written, "downloaded object");
        Ok(StagedFile {
            path,
            input: InputMode::Full,
            size_hint: Some(written),
        })
    }

    fn temp_path(&self, object: &ObjectInfo) -> Result<TempPath> {
        let suffix = object.extension().map(|ext| format!(".{ext}")).unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)
            .or_raise(|| ErrorKind::Staging(self.temp_dir.display().to_string()))?;
        Ok(file.into_temp_path())
    }
}
