use crate::Context;
use crate::extraction::ExtractionPlan;
use crate::extraction::error::ErrorKind as ExtractionErrorKind;
use crate::scan::error::{ErrorKind, Result as ScanResult};
use derive_more::Display;
use exn::ResultExt;
use tuneshelf_cache::UpsertOutcome;
use tuneshelf_storage::ObjectInfo;

/// Where a single object is in its processing.
///
/// ```text
/// Discovered ─┬─> Skipped
///             └─> Extracting ─┬─> Resolving ─┬─> Upserted ──> CacheUpdated
///                             ├─> Errored    └─> Errored
///                             └─> Interrupted
/// ```
///
/// A failed cache write leaves a file in `Upserted`; the catalog is already
/// correct and the next scan simply re-extracts it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    Discovered,
    Skipped,
    Extracting,
    Resolving,
    Upserted,
    CacheUpdated,
    Errored,
    Interrupted,
}

/// The outcome of processing one object.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub key: String,
    pub state: FileState,
    /// What the catalog write did, once one happened.
    pub outcome: Option<UpsertOutcome>,
    pub plan: Option<ExtractionPlan>,
    /// The duration was derived from bitrate and size, not read.
    pub duration_estimated: bool,
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: FileState::Discovered,
            outcome: None,
            plan: None,
            duration_estimated: false,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == FileState::Errored
    }

    fn advance(&mut self, next: FileState) {
        tracing::trace!(key = %self.key, from = %self.state, to = %next, "file state");
        self.state = next;
    }
}

/// Process a single object: cache gate, extraction, catalog resolution and
/// cache update.
///
/// Never fails; problems are recorded in the returned report (and logged)
/// so that one bad file cannot abort a scan.
pub async fn scan_object(ctx: &Context, object: &ObjectInfo, force: bool) -> FileReport {
    let mut report = FileReport::new(&object.key);
    if let Err(err) = scan_object_inner(ctx, object, force, &mut report).await {
        tracing::warn!(key = %object.key, error = %err, "unable to process object");
        tracing::debug!(key = %object.key, error = ?err, "error tree");
        report.error = Some(err.to_string());
        report.advance(FileState::Errored);
    }
    report
}

async fn scan_object_inner(ctx: &Context, object: &ObjectInfo, force: bool, report: &mut FileReport) -> ScanResult<()> {
    let bucket = ctx.source.bucket();
    let mut entry = ctx
        .cache
        .find_or_create_for_key(bucket, &object.key)
        .await
        .or_raise(|| ErrorKind::Cache)?;
    if !force && !entry.has_changed(&object.etag, object.size) {
        if let Err(err) = ctx.cache.mark_scanned(&mut entry).await {
            tracing::warn!(key = %object.key, error = %err, "unable to mark object as scanned");
        }
        report.advance(FileState::Skipped);
        return Ok(());
    }

    report.advance(FileState::Extracting);
    let extraction = match ctx.extractor.extract(object).await {
        Ok(extraction) => extraction,
        Err(err) if *err == ExtractionErrorKind::Interrupted => {
            report.advance(FileState::Interrupted);
            return Ok(());
        },
        Err(err) => {
            let cause = err.to_string();
            return Err(err).or_raise(|| ErrorKind::Extraction(cause));
        },
    };
    tracing::debug!(
        key = %object.key,
        input = %extraction.input,
        placement = %extraction.placement,
        estimated = extraction.metadata.duration_estimated,
        "extracted metadata"
    );
    report.plan = Some(extraction.plan.clone());
    report.duration_estimated = extraction.metadata.duration_estimated;

    report.advance(FileState::Resolving);
    let outcome = ctx
        .resolver
        .resolve(object, &extraction.metadata)
        .await
        .or_raise(|| ErrorKind::Catalog)?;
    report.outcome = Some(outcome);
    report.advance(FileState::Upserted);

    match ctx
        .cache
        .update_from_scan(&mut entry, &object.etag, object.size, Some(object.last_modified))
        .await
    {
        Ok(()) => report.advance(FileState::CacheUpdated),
        Err(err) => tracing::warn!(key = %object.key, error = %err, "unable to update scan cache"),
    }
    Ok(())
}
