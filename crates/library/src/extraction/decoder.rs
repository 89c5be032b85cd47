//! Where decoding runs: in this process, or in an isolated worker.

use crate::extraction::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use tuneshelf_config::ExtractionConfig;
use tuneshelf_extract::wire;
use tuneshelf_extract::{CanonicalMetadata, TagDecoder};

/// Decodes a staged local file.
///
/// `size_hint` is the real object size as listed by the source, used to
/// estimate a duration the container doesn't state.
#[async_trait]
pub trait MetadataDecoder: Send + Sync {
    async fn decode(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata>;
}

pub type DecoderHandle = Arc<dyn MetadataDecoder>;

/// Runs the tag decoder on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessDecoder {
    decoder: TagDecoder,
}
impl InProcessDecoder {
    pub fn new(decoder: TagDecoder) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl MetadataDecoder for InProcessDecoder {
    async fn decode(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata> {
        let decoder = self.decoder;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decoder.decode_with_size_hint(&path, size_hint))
            .await
            // A panic inside the decoder is just another failed decode.
            .or_raise(|| ErrorKind::Decode)?
            .or_raise(|| ErrorKind::Decode)
    }
}

/// Runs the decoder in a child process speaking the
/// [wire protocol](tuneshelf_extract::wire).
///
/// A crash, hang or runaway allocation in the child can only fail the one
/// file. The child is killed when its wall-clock budget runs out.
#[derive(Debug, Clone)]
pub struct SubprocessDecoder {
    program: PathBuf,
    leading_args: Vec<OsString>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl SubprocessDecoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout,
            cancel,
        }
    }

    /// Worker from configuration; the program defaults to the running
    /// executable.
    pub fn from_config(config: &ExtractionConfig, cancel: CancellationToken) -> Result<Self> {
        let program = match &config.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe().or_raise(|| ErrorKind::Worker("unable to locate own executable".into()))?,
        };
        Ok(Self::new(program, config.worker_timeout(), cancel))
    }

    /// Arguments placed before the protocol's own (`extract <path> ...`).
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl MetadataDecoder for SubprocessDecoder {
    #[instrument(level = "debug", skip_all, fields(program = %self.program.display(), path = %path.display(), ?size_hint))]
    async fn decode(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata> {
        if self.cancel.is_cancelled() {
            exn::bail!(ErrorKind::Interrupted);
        }
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(wire::worker_args(path, size_hint))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command
            .spawn()
            .or_raise(|| ErrorKind::Worker(format!("unable to launch {}", self.program.display())))?;

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.or_raise(|| ErrorKind::Worker("unable to collect output".into()))?,
            Err(_) => exn::bail!(ErrorKind::Timeout(self.timeout.as_secs())),
        };
        for line in String::from_utf8_lossy(&output.stderr).lines().filter(|line| !line.trim().is_empty()) {
            tracing::debug!(stderr = line, "worker output");
        }

        match wire::parse_output(&String::from_utf8_lossy(&output.stdout)) {
            Ok(metadata) if output.status.success() => Ok(metadata),
            Ok(_) => exn::bail!(ErrorKind::Worker(format!("{} despite a success response", output.status))),
            Err(err) => {
                let message = format!("{}: {err}", output.status);
                Err(err).or_raise(|| ErrorKind::Worker(message))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
    const FRAME_LEN: usize = 417;

    fn shell(script: &str, timeout: Duration, cancel: CancellationToken) -> SubprocessDecoder {
        SubprocessDecoder::new("/bin/sh", timeout, cancel).with_leading_args(["-c", script, "worker"])
    }

    fn run(script: &str) -> SubprocessDecoder {
        shell(script, Duration::from_secs(10), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_in_process_decodes_mp3() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&FRAME_HEADER);
        std::fs::write(&path, frame.repeat(100)).unwrap();

        let metadata = InProcessDecoder::default().decode(&path, None).await.unwrap();
        assert!(metadata.duration > 0.0);
        assert!(!metadata.duration_estimated);
    }

    #[tokio::test]
    async fn test_in_process_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = InProcessDecoder::default().decode(&path, None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_worker_success() {
        let decoder = run(r#"echo '{"title":"Zoë","duration":2.5}'"#);
        let metadata = decoder.decode(Path::new("/music/a.mp3"), None).await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Zoë"));
        assert_eq!(metadata.duration, 2.5);
    }

    #[tokio::test]
    async fn test_worker_receives_protocol_arguments() {
        let script = r#"[ "$1" = extract ] && [ "$2" = /music/a.mp3 ] && [ "$3" = --size ] && echo "{\"duration\": $4}""#;
        let metadata = run(script).decode(Path::new("/music/a.mp3"), Some(1234)).await.unwrap();
        assert_eq!(metadata.duration, 1234.0);
    }

    #[tokio::test]
    async fn test_worker_error_object() {
        let err = run(r#"echo '{"error":"bad frame"}'; exit 1"#)
            .decode(Path::new("a.mp3"), None)
            .await
            .unwrap_err();
        let ErrorKind::Worker(message) = &*err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("bad frame"), "{message}");
    }

    #[tokio::test]
    async fn test_worker_garbage_and_empty_output() {
        for script in ["echo nope", "true", "echo '{\"duration\": 1}'; exit 3"] {
            let err = run(script).decode(Path::new("a.mp3"), None).await.unwrap_err();
            assert!(matches!(&*err, ErrorKind::Worker(_)), "{script}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_worker_timeout() {
        let decoder = shell("sleep 10", Duration::from_millis(200), CancellationToken::new());
        let err = decoder.decode(Path::new("a.mp3"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let decoder = SubprocessDecoder::new("/nonexistent/worker", Duration::from_secs(1), CancellationToken::new());
        let err = decoder.decode(Path::new("a.mp3"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Worker(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_launch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Would fail differently if it were launched.
        let decoder = SubprocessDecoder::new("/nonexistent/worker", Duration::from_secs(1), cancel);
        let err = decoder.decode(Path::new("a.mp3"), None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Interrupted);
    }

    #[test]
    fn test_from_config_defaults_to_current_exe() {
        let config = tuneshelf_config::Config::default().extraction;
        let decoder = SubprocessDecoder::from_config(&config, CancellationToken::new()).unwrap();
        assert_eq!(decoder.program(), std::env::current_exe().unwrap().as_path());
        assert_eq!(decoder.timeout, Duration::from_secs(120));
    }
}
