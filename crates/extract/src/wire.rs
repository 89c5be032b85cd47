//! Worker wire protocol.
//!
//! The isolated worker is invoked as `<program> extract <path> [--size N]`
//! and writes exactly one line of JSON to stdout: either the
//! [`CanonicalMetadata`] object (cover art omitted) or `{"error": "..."}`.
//! It exits with `0` on success and `1` on error.

use crate::decoder::TagDecoder;
use crate::error::{ErrorKind, Result};
use crate::models::CanonicalMetadata;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Subcommand name the worker listens on.
pub const EXTRACT_COMMAND: &str = "extract";
/// Flag carrying the real object size.
pub const SIZE_FLAG: &str = "--size";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    // Must stay first: an error object would otherwise never be tried.
    Failure { error: String },
    Success(CanonicalMetadata),
}

impl WorkerResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Process exit code for this response.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Single-line JSON encoding, without a trailing newline.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| exn::Exn::from(ErrorKind::WorkerProtocol(e.to_string())))
    }

    pub fn into_result(self) -> Result<CanonicalMetadata> {
        match self {
            Self::Success(metadata) => Ok(metadata),
            Self::Failure { error } => exn::bail!(ErrorKind::WorkerFailed(error)),
        }
    }
}

/// Worker side: decode `path` and build the response to print.
pub fn respond(path: &Path, size_hint: Option<u64>) -> WorkerResponse {
    respond_with(&TagDecoder::default(), path, size_hint)
}

/// As [`respond`], with a caller-configured decoder.
pub fn respond_with(decoder: &TagDecoder, path: &Path, size_hint: Option<u64>) -> WorkerResponse {
    match decoder.decode_with_size_hint(path, size_hint) {
        Ok(metadata) => WorkerResponse::Success(metadata),
        Err(err) => WorkerResponse::Failure { error: err.to_string() },
    }
}

/// Caller side: interpret the worker's stdout.
///
/// Tolerates surrounding whitespace and stray leading lines; the last
/// non-empty line is the response.
pub fn parse_output(stdout: &str) -> Result<CanonicalMetadata> {
    let Some(line) = stdout.lines().map(str::trim).rfind(|line| !line.is_empty()) else {
        exn::bail!(ErrorKind::WorkerProtocol("empty output".to_string()));
    };
    let response: WorkerResponse = serde_json::from_str(line)
        .map_err(|e| exn::Exn::from(ErrorKind::WorkerProtocol(format!("unparsable output: {e}"))))?;
    response.into_result()
}

/// Arguments for invoking the worker on `path`.
pub fn worker_args(path: &Path, size_hint: Option<u64>) -> Vec<std::ffi::OsString> {
    let mut args = vec![EXTRACT_COMMAND.into(), path.as_os_str().to_owned()];
    if let Some(size) = size_hint {
        args.push(SIZE_FLAG.into());
        args.push(size.to_string().into());
    }
    args
}
