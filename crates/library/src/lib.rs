//! Incremental scanning of a remote audio library into the catalog.
//!
//! A [`Context`] bundles everything one scan run needs: the object source,
//! the scan cache, the catalog resolver and the extraction pipeline. Build it
//! with [`Context::builder`], then drive it with [`scan::scan`] or consume
//! [`scan::scan_stream`] directly.

pub mod budget;
pub mod error;
pub mod extraction;
mod resolve;
pub mod scan;

pub use crate::resolve::{CatalogResolver, FolderName, smart_folder_name};

use crate::budget::{HostBudget, ResourceBudget};
use crate::error::{ErrorKind, Result};
use crate::extraction::{DecoderHandle, Extractor, InProcessDecoder, Stager, StrategySelector, SubprocessDecoder};
use exn::ResultExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tuneshelf_cache::{Catalog, Database, ScanCache};
use tuneshelf_config::Config;
use tuneshelf_storage::SourceHandle;
use tuneshelf_storage::backend::ExtensionFilter;

/// Everything a scan run needs.
pub struct Context {
    pub(crate) source: SourceHandle,
    pub(crate) cache: ScanCache,
    pub(crate) resolver: CatalogResolver,
    pub(crate) extractor: Extractor,
    pub(crate) prefix: Option<String>,
    pub(crate) concurrency: usize,
    pub(crate) progress_interval: u64,
    pub(crate) cancel: CancellationToken,
}

impl Context {
    pub fn builder<'a>(source: SourceHandle, database: &'a Database, config: &'a Config) -> ContextBuilder<'a> {
        ContextBuilder {
            source,
            database,
            config,
            cancel: CancellationToken::new(),
            budget: None,
            in_process: None,
            subprocess: None,
        }
    }

    /// The (extension filtered) source being scanned.
    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    pub fn catalog(&self) -> &Catalog {
        self.resolver.catalog()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Cancelling this token stops enumeration and new worker launches.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

pub struct ContextBuilder<'a> {
    source: SourceHandle,
    database: &'a Database,
    config: &'a Config,
    cancel: CancellationToken,
    budget: Option<Arc<dyn ResourceBudget>>,
    in_process: Option<DecoderHandle>,
    subprocess: Option<DecoderHandle>,
}

impl ContextBuilder<'_> {
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Memory accounting for the strategy selector; defaults to the host's.
    pub fn budget(mut self, budget: Arc<dyn ResourceBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Defaults to [`InProcessDecoder`].
    pub fn in_process_decoder(mut self, decoder: DecoderHandle) -> Self {
        self.in_process = Some(decoder);
        self
    }

    /// Defaults to a [`SubprocessDecoder`] built from configuration.
    pub fn subprocess_decoder(mut self, decoder: DecoderHandle) -> Self {
        self.subprocess = Some(decoder);
        self
    }

    pub fn build(self) -> Result<Context> {
        let Self {
            source,
            database,
            config,
            cancel,
            budget,
            in_process,
            subprocess,
        } = self;
        let source: SourceHandle = Arc::new(ExtensionFilter::new(source, &config.scan.extensions));
        let budget = budget.unwrap_or_else(|| Arc::new(HostBudget::new()));
        let in_process = in_process.unwrap_or_else(|| Arc::new(InProcessDecoder::default()));
        let subprocess = match subprocess {
            Some(decoder) => decoder,
            None => Arc::new(
                SubprocessDecoder::from_config(&config.extraction, cancel.clone()).or_raise(|| ErrorKind::Setup)?,
            ),
        };
        let extractor = Extractor::new(
            StrategySelector::new(&config.extraction, budget),
            Stager::new(source.clone(), &config.extraction),
            in_process,
            subprocess,
        );
        Ok(Context {
            source,
            cache: ScanCache::from(database),
            resolver: CatalogResolver::new(Catalog::from(database), config.scan.special_folders.clone()),
            extractor,
            prefix: config.scan.prefix.clone(),
            concurrency: config.scan.concurrency.max(1),
            progress_interval: config.scan.progress_interval,
            cancel,
        })
    }
}
