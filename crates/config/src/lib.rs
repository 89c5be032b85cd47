//! Layered configuration for tuneshelf.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults,
//! 2. `tuneshelf.{toml,yaml,yml,json}` in the project config directory,
//! 3. the same file names in the working directory,
//! 4. an explicitly given file (which must exist),
//! 5. `TUNESHELF_*` environment variables, `__` separating nested keys
//!    (`TUNESHELF_SCAN__CONCURRENCY=8`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APPLICATION: &str = "tuneshelf";
const ENV_PREFIX: &str = "TUNESHELF_";
const FILE_STEM: &str = "tuneshelf";
const FILE_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
    pub extraction: ExtractionConfig,
}

/// Where the audio library lives.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}

// Hand-written so credentials never reach logs.
impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            Self::S3 { bucket, prefix, region, endpoint, key_id, .. } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("prefix", prefix)
                .field("region", region)
                .field("endpoint", endpoint)
                .field("key_id", key_id)
                .field("key_secret", &"<redacted>")
                .finish(),
        }
    }
}

impl SourceConfig {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::S3 { .. } => "s3",
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file holding both the scan cache and the catalog.
    pub database: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Only list objects under this key prefix.
    pub prefix: Option<String>,
    /// Extension allow-list, lowercase without dots.
    pub extensions: Vec<String>,
    /// Top-level folders whose smart folder spans two path segments.
    pub special_folders: Vec<String>,
    /// Objects processed concurrently.
    pub concurrency: usize,
    /// Report progress every this many processed objects.
    pub progress_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Extensions always decoded in the isolated worker.
    pub memory_intensive_formats: Vec<String>,
    /// Objects at least this large are decoded in the isolated worker.
    pub size_threshold_bytes: u64,
    /// Below this much free memory, decode in the isolated worker.
    pub headroom_threshold_bytes: u64,
    /// Reconstruct files from header and footer ranges instead of
    /// downloading them whole.
    pub partial_reads: bool,
    pub header_bytes: u64,
    pub footer_bytes: u64,
    pub worker_timeout_secs: u64,
    /// Worker executable; defaults to the running binary.
    pub worker_program: Option<PathBuf>,
    /// Where downloaded and reconstructed files are staged.
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let dirs = ProjectDirs::from("", "", APPLICATION);
        let database = dirs
            .as_ref()
            .map(|dirs| dirs.data_dir().join("tuneshelf.db"))
            .unwrap_or_else(|| PathBuf::from("tuneshelf.db"));
        Self {
            source: SourceConfig::Local { root: PathBuf::from(".") },
            cache: CacheConfig { database },
            scan: ScanConfig {
                prefix: None,
                extensions: strings(&[
                    "mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "aiff", "aif", "wma", "ape", "wv", "alac",
                ]),
                special_folders: Vec::new(),
                concurrency: 4,
                progress_interval: 25,
            },
            extraction: ExtractionConfig {
                memory_intensive_formats: strings(&["flac", "wav", "aiff", "aif", "ape", "wv", "dsf", "dff"]),
                size_threshold_bytes: 50 * MIB,
                headroom_threshold_bytes: 256 * MIB,
                partial_reads: true,
                header_bytes: 256 * KIB,
                footer_bytes: 128 * KIB,
                worker_timeout_secs: 120,
                worker_program: None,
                temp_dir: None,
            },
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn normalize_extensions(values: &mut Vec<String>) {
    for value in values.iter_mut() {
        *value = value.trim().trim_start_matches('.').to_ascii_lowercase();
    }
    values.retain(|value| !value.is_empty());
    values.sort();
    values.dedup();
}

impl Config {
    /// Load the layered configuration, optionally from an explicit file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path)?)
    }

    /// Build (but don't extract) the layered provider chain.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dirs) = ProjectDirs::from("", "", APPLICATION) {
            candidates.extend(FILE_EXTENSIONS.iter().map(|ext| dirs.config_dir().join(format!("{FILE_STEM}.{ext}"))));
        }
        candidates.extend(FILE_EXTENSIONS.iter().map(|ext| PathBuf::from(format!("{FILE_STEM}.{ext}"))));
        for candidate in candidates.iter().filter(|candidate| candidate.is_file()) {
            tracing::debug!(path = %candidate.display(), "merging configuration file");
            figment = merge_file(figment, candidate)?;
        }
        if let Some(path) = path {
            if !path.is_file() {
                exn::bail!(ErrorKind::FileNotFound(path.display().to_string()));
            }
            tracing::debug!(path = %path.display(), "merging configuration file");
            figment = merge_file(figment, path)?;
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Self = figment
            .extract()
            .map_err(|e| exn::Exn::from(ErrorKind::Load(e.to_string())))?;
        normalize_extensions(&mut config.scan.extensions);
        normalize_extensions(&mut config.extraction.memory_intensive_formats);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| exn::Exn::from(ErrorKind::Invalid(message.to_string()));
        if self.scan.extensions.is_empty() {
            return Err(invalid("scan.extensions must not be empty"));
        }
        if self.scan.concurrency == 0 {
            return Err(invalid("scan.concurrency must be at least 1"));
        }
        if self.scan.progress_interval == 0 {
            return Err(invalid("scan.progress_interval must be at least 1"));
        }
        let extraction = &self.extraction;
        for (value, name) in [
            (extraction.size_threshold_bytes, "extraction.size_threshold_bytes"),
            (extraction.headroom_threshold_bytes, "extraction.headroom_threshold_bytes"),
            (extraction.header_bytes, "extraction.header_bytes"),
            (extraction.footer_bytes, "extraction.footer_bytes"),
            (extraction.worker_timeout_secs, "extraction.worker_timeout_secs"),
        ] {
            if value == 0 {
                return Err(invalid(&format!("{name} must be greater than zero")));
            }
        }
        if let SourceConfig::S3 { bucket, .. } = &self.source
            && bucket.trim().is_empty()
        {
            return Err(invalid("source.bucket must not be empty"));
        }
        Ok(())
    }
}

impl ExtractionConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    Ok(match extension.as_str() {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn load_in_jail(path: Option<&Path>) -> std::result::Result<Config, figment::Error> {
        Config::load(path).map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_in_jail(None)?;
            assert_eq!(config.source, SourceConfig::Local { root: PathBuf::from(".") });
            assert_eq!(config.scan.concurrency, 4);
            assert!(config.scan.extensions.contains(&"mp3".to_string()));
            assert!(config.extraction.memory_intensive_formats.contains(&"flac".to_string()));
            assert_eq!(config.extraction.size_threshold_bytes, 50 * MIB);
            assert_eq!(config.extraction.headroom_threshold_bytes, 256 * MIB);
            assert_eq!(config.extraction.header_bytes, 256 * KIB);
            assert_eq!(config.extraction.footer_bytes, 128 * KIB);
            assert_eq!(config.extraction.worker_timeout(), Duration::from_secs(120));
            assert!(config.extraction.partial_reads);
            Ok(())
        });
    }

    #[test]
    fn test_file_in_working_directory() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tuneshelf.toml",
                r#"
                    [source]
                    kind = "s3"
                    bucket = "music"
                    prefix = "library"
                    key_id = "id"
                    key_secret = "secret"

                    [scan]
                    special_folders = ["Xmas"]
                    extensions = [".MP3", "flac", "mp3"]
                "#,
            )?;
            let config = load_in_jail(None)?;
            let SourceConfig::S3 { bucket, prefix, region, .. } = &config.source else {
                panic!("expected an s3 source, got {:?}", config.source);
            };
            assert_eq!(bucket, "music");
            assert_eq!(prefix.as_deref(), Some("library"));
            assert_eq!(region, "us-east-1");
            assert_eq!(config.scan.special_folders, vec!["Xmas"]);
            assert_eq!(config.scan.extensions, vec!["flac", "mp3"]);
            assert!(!format!("{:?}", config.source).contains("secret\""));
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "scan:\n  concurrency: 2\n  progress_interval: 10\n")?;
            jail.set_env("TUNESHELF_SCAN__CONCURRENCY", "8");
            jail.set_env("TUNESHELF_EXTRACTION__PARTIAL_READS", "false");
            let config = load_in_jail(Some(Path::new("custom.yaml")))?;
            assert_eq!(config.scan.concurrency, 8);
            assert_eq!(config.scan.progress_interval, 10);
            assert!(!config.extraction.partial_reads);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_file_format() {
        Jail::expect_with(|jail| {
            jail.create_file("config.ini", "[scan]")?;
            let err = Config::load(Some(Path::new("config.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("scan.extensions must not be empty", |c: &mut Config| c.scan.extensions.clear())]
    #[case("scan.concurrency must be at least 1", |c: &mut Config| c.scan.concurrency = 0)]
    #[case("extraction.header_bytes must be greater than zero", |c: &mut Config| c.extraction.header_bytes = 0)]
    #[case(
        "extraction.size_threshold_bytes must be greater than zero",
        |c: &mut Config| c.extraction.size_threshold_bytes = 0
    )]
    #[case("source.bucket must not be empty", |c: &mut Config| c.source = SourceConfig::S3 {
        bucket: " ".into(),
        prefix: None,
        region: default_region(),
        endpoint: None,
        key_id: "id".into(),
        key_secret: "secret".into(),
    })]
    fn test_validation(#[case] message: &str, #[case] mutate: fn(&mut Config)) {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert_eq!(*err, ErrorKind::Invalid(message.to_string()));
    }

    #[test]
    fn test_default_is_valid() {
        Config::default().validate().unwrap();
    }
}
