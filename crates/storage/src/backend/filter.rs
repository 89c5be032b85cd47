//! Extension-filtered source decorator.
//!
//! Wraps another source and restricts all operations to objects whose key
//! carries one of an allow-list of extensions (compared case-insensitively).

use crate::backend::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::object::{ByteRange, ObjectHead};
use crate::{ObjectSource, SourceHandle, key_extension};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::Path;

/// Extension-filtered object source.
///
/// Listing silently drops objects with other extensions; direct access to
/// such keys returns [`ErrorKind::FilteredKey`].
#[derive(Clone)]
pub struct ExtensionFilter {
    inner: SourceHandle,
    extensions: HashSet<String>,
}
impl ExtensionFilter {
    pub fn new(inner: SourceHandle, extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { inner, extensions }
    }

    pub fn allows(&self, key: &str) -> bool {
        key_extension(key).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn check(&self, key: &str) -> Result<()> {
        if !self.allows(key) {
            exn::bail!(ErrorKind::FilteredKey(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for ExtensionFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        Box::pin(self.inner.list_stream(prefix).filter(|item| {
            std::future::ready(match item {
                Ok(object) => self.allows(&object.key),
                Err(_) => true, // propagate errors
            })
        }))
    }

    async fn get(&self, key: &str, destination: &Path) -> Result<u64> {
        self.check(key)?;
        self.inner.get(key, destination).await
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>> {
        self.check(key)?;
        self.inner.get_range(key, range).await
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        self.check(key)?;
        self.inner.head(key).await
    }
}
