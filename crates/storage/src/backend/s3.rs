//! S3-compatible object source.
//!
//! This module provides an object source for S3-compatible services
//! including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file. Each
//! source specifies its own `key_id` and `key_secret`.

use crate::backend::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::object::{ByteRange, ObjectHead, ObjectInfo};
use crate::{ObjectSource, check_raw_key, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::DateTime,
};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use std::sync::Arc;
use time::UtcDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible object source.
///
/// Reads objects from an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use tuneshelf_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = S3Backend::new(
///     "b2",
///     "my-music",
///     Some("library/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 object source.
    ///
    /// # Arguments
    /// * `name` - A name for this source (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.map(validate_key).transpose()?;
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "tuneshelf-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    fn full_key(&self, key: &str) -> Result<String> {
        full_key(self.prefix.as_deref(), key)
    }

    fn relative_key(&self, key: &str) -> Result<String> {
        relative_key(self.prefix.as_deref(), key)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    /// Convert AWS DateTime to UtcDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<UtcDateTime> {
        UtcDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    fn object_info(&self, object: &Object) -> Result<Option<ObjectInfo>> {
        let Some(key) = object.key() else {
            return Ok(None);
        };
        // "Directory" placeholder objects.
        if key.ends_with('/') {
            return Ok(None);
        }
        let size = object.size().unwrap_or(0);
        let size = u64::try_from(size).or_raise(|| ErrorKind::BackendError(format!("negative size for {key}")))?;
        let etag = object.e_tag().ok_or_raise(|| ErrorKind::BackendError(format!("missing etag for {key}")))?;
        let modified = match object.last_modified() {
            Some(dt) => Self::parse_datetime(dt)?,
            None => UtcDateTime::UNIX_EPOCH,
        };
        Ok(Some(ObjectInfo::new(self.relative_key(key)?, size, etag, modified)))
    }

    fn network<E: std::error::Error>(err: E) -> ErrorKind {
        ErrorKind::Network(DisplayErrorContext(err).to_string())
    }
}

/// Full S3 key for a relative key, which is used exactly as listed.
fn full_key(prefix: Option<&str>, key: &str) -> Result<String> {
    Ok(join_prefix(prefix, check_raw_key(key)?))
}

/// Relative key for a listed S3 key: the configured prefix is stripped,
/// nothing else is rewritten.
fn relative_key(prefix: Option<&str>, key: &str) -> Result<String> {
    check_raw_key(strip_prefix(prefix, key)).map(str::to_string)
}

fn join_prefix(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
        None => key.to_string(),
    }
}

fn strip_prefix<'k>(prefix: Option<&str>, key: &'k str) -> &'k str {
    match prefix {
        Some(prefix) => {
            let prefix_normalized = prefix.trim_end_matches('/');
            key.strip_prefix(prefix_normalized).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
        },
        None => key,
    }
}

#[async_trait]
impl ObjectSource for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        // Raw prefix match, S3 style: "Rock/Sub" matches "Rock/Subdir/...".
        let list_prefix = match (self.prefix.as_deref(), prefix) {
            (base, Some(pfx)) => Some(join_prefix(base, pfx.trim_start_matches('/'))),
            (Some(base), None) => Some(format!("{}/", base.trim_end_matches('/'))),
            (None, None) => None,
        };
        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let permit = match self.acquire_permit().await {
                    Ok(permit) => permit,
                    Err(e) => { yield Err(e); return; },
                };
                let response = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .set_prefix(list_prefix.clone())
                    .set_continuation_token(continuation.take())
                    .send()
                    .await;
                drop(permit);
                let response = match response {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::network(e)));
                        return;
                    },
                };
                for object in response.contents() {
                    match self.object_info(object) {
                        Ok(Some(info)) => yield Ok(info),
                        Ok(None) => {},
                        Err(e) => yield Err(e),
                    }
                }
                match response.next_continuation_token() {
                    Some(token) if response.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                    _ => break,
                }
            }
        })
    }

    async fn get(&self, key: &str, destination: &Path) -> Result<u64> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(key.to_string()))
            },
            Err(e) => exn::bail!(Self::network(e)),
        };
        let mut body = output.body;
        let mut file = tokio::fs::File::create(destination).await.map_err(ErrorKind::Io)?;
        let mut written: u64 = 0;
        while let Some(chunk) = body.try_next().await.map_err(Self::network)? {
            file.write_all(&chunk).await.map_err(ErrorKind::Io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(ErrorKind::Io)?;
        tracing::debug!(source = %self.name, key, bytes = written, "Downloaded complete object");
        Ok(written)
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>> {
        let Some(header) = range.http_header() else {
            return Ok(Vec::new());
        };
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&full_key).range(header).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(key.to_string()))
            },
            Err(e) if e.raw_response().is_some_and(|r| r.status().as_u16() == 416) => {
                exn::bail!(ErrorKind::InvalidRange(key.to_string(), range.to_string()))
            },
            Err(e) => exn::bail!(Self::network(e)),
        };
        let bytes = output.body.collect().await.map_err(Self::network)?.into_bytes();
        Ok(bytes.to_vec())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.head_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => return Ok(None),
            Err(e) => exn::bail!(Self::network(e)),
        };
        let size = u64::try_from(output.content_length().unwrap_or(0))
            .or_raise(|| ErrorKind::BackendError(format!("negative size for {key}")))?;
        let etag = output.e_tag().ok_or_raise(|| ErrorKind::BackendError(format!("missing etag for {key}")))?;
        let last_modified = match output.last_modified() {
            Some(dt) => Self::parse_datetime(dt)?,
            None => UtcDateTime::UNIX_EPOCH,
        };
        Ok(Some(ObjectHead { size, etag: etag.to_string(), last_modified }))
    }
}
