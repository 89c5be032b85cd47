//! `tuneshelf` command line.
//!
//! Logs go to stderr: the `extract` worker's stdout carries nothing but its
//! single JSON response line.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use tuneshelf_cache::Database;
use tuneshelf_config::{Config, SourceConfig};
use tuneshelf_extract::{AudioFormat, TagDecoder, wire};
use tuneshelf_library::Context;
use tuneshelf_library::scan::{ScanOptions, scan};
use tuneshelf_storage::SourceHandle;
use tuneshelf_storage::backend::{LocalBackend, S3Backend};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Decode one local audio file and print its metadata as a JSON line.
    Extract {
        path: PathBuf,
        /// Real size of the remote object, when `path` is a partial copy.
        #[arg(long)]
        size: Option<u64>,
        /// Decode as this format instead of sniffing the file.
        #[arg(long, value_parser = parse_format)]
        format: Option<AudioFormat>,
    },
    /// Scan the configured source into the catalog.
    Scan {
        /// Configuration file layered over the defaults.
        #[arg(long, env = "TUNESHELF_CONFIG")]
        config: Option<PathBuf>,
        /// Re-extract every object, ignoring the scan cache.
        #[arg(long)]
        force: bool,
        /// Stop after this many objects.
        #[arg(long)]
        limit: Option<u64>,
    },
}

fn parse_format(value: &str) -> std::result::Result<AudioFormat, String> {
    value.parse::<AudioFormat>().map_err(|err| err.to_string())
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    // A second initialisation (only possible in tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();
    let result = match cli.command {
        Command::Extract { path, size, format } => extract(path, size, format),
        Command::Scan { config, force, limit } => run_scan(config, ScanOptions { force, limit }).await,
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "{err}");
            ExitCode::FAILURE
        },
    }
}

fn extract(path: PathBuf, size: Option<u64>, format: Option<AudioFormat>) -> Result<ExitCode> {
    let decoder = match format {
        Some(format) => TagDecoder::default().with_format(format).or_raise(|| ErrorKind::Format)?,
        None => TagDecoder::default(),
    };
    let response = wire::respond_with(&decoder, &path, size);
    let line = response.to_line().or_raise(|| ErrorKind::Output)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").or_raise(|| ErrorKind::Output)?;
    stdout.flush().or_raise(|| ErrorKind::Output)?;
    Ok(ExitCode::from(response.exit_code() as u8))
}

async fn open_source(config: &SourceConfig) -> Result<SourceHandle> {
    let source: SourceHandle = match config {
        SourceConfig::Local { root } => {
            let root = std::path::absolute(root).or_raise(|| ErrorKind::Source)?;
            Arc::new(LocalBackend::new(config.name(), root).or_raise(|| ErrorKind::Source)?)
        },
        SourceConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => Arc::new(
            S3Backend::new(
                config.name(),
                bucket,
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret,
            )
            .await
            .or_raise(|| ErrorKind::Source)?,
        ),
    };
    Ok(source)
}

async fn run_scan(config_path: Option<PathBuf>, options: ScanOptions) -> Result<ExitCode> {
    let config = Config::load(config_path.as_deref()).or_raise(|| ErrorKind::Config)?;
    tracing::debug!(?config, "loaded configuration");
    let source = open_source(&config.source).await?;
    // Each scan worker holds at most one connection at a time.
    let pool_size = u32::try_from(config.scan.concurrency).unwrap_or(u32::MAX).saturating_add(1);
    let database = Database::connect_with_pool_size(&config.cache.database, pool_size)
        .await
        .or_raise(|| ErrorKind::Database)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing in-flight files");
                cancel.cancel();
            }
        }
    });

    let ctx = Context::builder(source, &database, &config)
        .cancellation(cancel)
        .build()
        .or_raise(|| ErrorKind::Setup)?;
    let result = scan(&ctx, options, |progress| {
        tracing::info!(
            total = progress.total_files,
            scanned = progress.scanned_files,
            new = progress.new_songs,
            updated = progress.updated_songs,
            errors = progress.errors,
            "progress"
        );
    })
    .await;
    database.close().await;
    let progress = result.or_raise(|| ErrorKind::Scan)?;
    Ok(if progress.errors == 0 { ExitCode::SUCCESS } else { ExitCode::from(2) })
}
