//! In-memory object source for testing.

use super::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::object::{ByteRange, ObjectHead, ObjectInfo};
use crate::{ObjectSource, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

#[derive(Clone)]
struct MockObject {
    data: Vec<u8>,
    etag: String,
    modified: UtcDateTime,
}
impl MockObject {
    fn new(data: Vec<u8>) -> Self {
        Self {
            etag: blake3::hash(&data).to_hex()[..32].to_string(),
            data,
            modified: UtcDateTime::now(),
        }
    }

    fn head(&self) -> ObjectHead {
        ObjectHead {
            size: self.data.len() as u64,
            etag: self.etag.clone(),
            last_modified: self.modified,
        }
    }
}

/// In-memory object source for testing.
///
/// Objects are stored in a sorted map behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Etags
/// are derived from the content, so replacing an object's bytes changes its
/// fingerprint. Full downloads and range reads are counted to let tests
/// assert which network path was taken.
///
/// # Examples
///
/// ```
/// use tuneshelf_storage::{ByteRange, ObjectSource, backend::MockBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = MockBackend::with_objects([("Rock/song.mp3", b"ID3...")]);
/// assert_eq!(source.get_range("Rock/song.mp3", ByteRange::new(0, 3)).await?, b"ID3");
/// assert_eq!(source.range_reads(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    bucket: String,
    storage: RwLock<BTreeMap<String, MockObject>>,
    full_reads: AtomicUsize,
    range_reads: AtomicUsize,
}

impl MockBackend {
    /// Create a mock source pre-populated with objects.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid key {key}");
            };
            map.insert(validated, MockObject::new(data.into()));
        }
        Self {
            name: "mock".to_string(),
            bucket: "mock-bucket".to_string(),
            storage: RwLock::new(map),
            full_reads: AtomicUsize::new(0),
            range_reads: AtomicUsize::new(0),
        }
    }

    /// Change the name of the mock source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Change the bucket identifier of the mock source.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Insert or replace an object; replacing content changes its etag.
    pub async fn put(&self, key: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.insert(key, MockObject::new(data.into()));
        Ok(())
    }

    /// Overwrite the etag of an existing object without touching its content.
    pub async fn set_etag(&self, key: &str, etag: impl Into<String>) -> Result<()> {
        let key = validate_key(key)?;
        let mut guard = self.storage.write().await;
        let object = guard.get_mut(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        object.etag = etag.into();
        Ok(())
    }

    /// Number of complete downloads served so far.
    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    /// Number of byte-range reads served so far.
    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }

    async fn object(&self, key: &str) -> Result<MockObject> {
        let key = validate_key(key)?;
        self.storage.read().await.get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectSource for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<ObjectInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| prefix.is_none_or(|pfx| key.starts_with(pfx)))
                    .map(|(key, object)| {
                        let head = object.head();
                        ObjectInfo::new(key.clone(), head.size, head.etag, head.last_modified)
                    })
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn get(&self, key: &str, destination: &Path) -> Result<u64> {
        let object = self.object(key).await?;
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, &object.data).await.or_raise(|| ErrorKind::BackendError(key.to_string()))?;
        Ok(object.data.len() as u64)
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>> {
        let object = self.object(key).await?;
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        let len = object.data.len() as u64;
        let start = usize::try_from(range.offset.min(len)).unwrap_or(usize::MAX);
        let end = usize::try_from(range.end().min(len)).unwrap_or(usize::MAX);
        Ok(object.data[start..end].to_vec())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.get(&key).map(MockObject::head))
    }
}
