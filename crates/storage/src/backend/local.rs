//! Local filesystem object source.
//!
//! Serves a directory tree as if it were a bucket. Files are accessed using
//! `tokio::fs` for async I/O, and etags are derived from the modification
//! time and size (the same weak validator static file servers emit), so
//! listing never has to read file contents.

use crate::backend::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::object::{ByteRange, ObjectHead, ObjectInfo};
use crate::{ObjectSource, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs::{self, DirEntry};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

enum WalkEntry {
    Object(ObjectInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem object source.
///
/// # Examples
///
/// ```no_run
/// use tuneshelf_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = LocalBackend::new("nas", "/absolute/path/to/music")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the library; doubles as the bucket identifier.
    root: PathBuf,
    bucket: String,
}
impl LocalBackend {
    /// Create a new local filesystem source.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let display = root.display().to_string();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(display));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(display));
            }
        } else {
            // Use non-async here; it'll only happen once on library initialization
            // and it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &display))?;
        }
        Ok(Self {
            name: name.into(),
            bucket: format!("file://{display}"),
            root,
        })
    }

    /// Get the absolute path for a key.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    /// Convert an absolute path back to a normalized key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{}` is not within root `{}`", absolute.display(), self.root.display()))
        })?;
        let relative = relative
            .to_str()
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidKey(relative.to_string_lossy().into_owned())))?;
        validate_key(relative.replace(std::path::MAIN_SEPARATOR, "/"))
    }

    /// Weak etag from modification time and size.
    fn etag(modified: UtcDateTime, size: u64) -> String {
        format!("W/\"{:x}-{:x}\"", modified.unix_timestamp_nanos(), size)
    }

    fn head_from_metadata(metadata: &Metadata) -> Result<ObjectHead> {
        let modified: UtcDateTime = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(ObjectHead {
            size: metadata.len(),
            etag: Self::etag(modified, metadata.len()),
            last_modified: modified,
        })
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, entry: DirEntry, prefix: Option<&str>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path.display().to_string()))?;
        let key = self.relative_key(&path)?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if let Some(pfx) = prefix
            && !Path::new(&key).starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            let head = Self::head_from_metadata(&metadata)?;
            return Ok(WalkEntry::Object(ObjectInfo::new(key, head.size, head.etag, head.last_modified)));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl ObjectSource for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        // Walk from the parent directory of the prefix so that a prefix
        // naming a file (or a directory that doesn't exist yet) still works.
        // Path::starts_with is component-based: "Rock/Sub" does not match
        // "Rock/Subdir/song.mp3".
        let start_dir = validated_prefix
            .as_ref()
            .map(|prefix| self.root.join(prefix).parent().unwrap_or(&self.root).to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Listing a directory that doesn't exist results in an
                    // empty list, consistent with S3-compatible backends.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current.display().to_string()))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::Object(o)) => yield Ok(o),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn get(&self, key: &str, destination: &Path) -> Result<u64> {
        let path = self.absolute_path(key)?;
        Ok(fs::copy(&path, destination).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>> {
        let path = self.absolute_path(key)?;
        let mut file = fs::File::open(&path).await.map_err(|e| Self::map_io_error(e, key))?;
        file.seek(SeekFrom::Start(range.offset)).await.map_err(ErrorKind::Io)?;
        let mut buffer = Vec::with_capacity(usize::try_from(range.length).unwrap_or(0));
        file.take(range.length).read_to_end(&mut buffer).await.map_err(ErrorKind::Io)?;
        Ok(buffer)
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        let path = self.absolute_path(key)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(Self::head_from_metadata(&metadata)?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(exn::Exn::from(Self::map_io_error(e, key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, key: &str, data: &[u8]) {
        let path = root.join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
    }

    #[test]
    fn test_absolute_path_prevents_traversal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert_eq!(source.absolute_path("Rock/song.mp3").unwrap(), temp_dir.path().join("Rock/song.mp3"));
        assert!(source.absolute_path("../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "Rock/Sub/song.mp3", b"a");
        write(temp_dir.path(), "Rock/Subdir/song.mp3", b"b");
        write(temp_dir.path(), "Rock/Subsong.mp3", b"c");
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        let mut objects = source.list(Some("Rock/Sub")).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects.pop().unwrap().key, "Rock/Sub/song.mp3");
        assert_eq!(source.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(source.list(Some("Nope/Nothing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_range_and_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "song.mp3", b"0123456789");
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert_eq!(source.get_range("song.mp3", ByteRange::new(2, 3)).await.unwrap(), b"234");
        // Past the end is truncated
        assert_eq!(source.get_range("song.mp3", ByteRange::new(8, 10)).await.unwrap(), b"89");
        let out = tempfile::tempdir().unwrap();
        let destination = out.path().join("copy.mp3");
        assert_eq!(source.get("song.mp3", &destination).await.unwrap(), 10);
        assert_eq!(std::fs::read(destination).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_head_and_etag_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "song.mp3", b"one");
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        let first = source.head("song.mp3").await.unwrap().unwrap();
        assert_eq!(first.size, 3);
        write(temp_dir.path(), "song.mp3", b"longer");
        let second = source.head("song.mp3").await.unwrap().unwrap();
        assert_ne!(first.etag, second.etag);
        assert!(source.head("missing.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = source.get("missing.mp3", &temp_dir.path().join("out")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
