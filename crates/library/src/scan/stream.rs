use crate::Context;
use crate::error::{ErrorKind, Result as LibraryResult};
use crate::scan::file::{FileReport, scan_object};
use crate::scan::progress::ScanProgress;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use tuneshelf_storage::ObjectInfo;
use tuneshelf_storage::error::Result as StorageResult;

/// Progress events emitted by [`scan_stream`] as it works through a source.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Processed`](Self::Processed) and [`ListingFailed`](Self::ListingFailed),
///    zero or more times, in completion order (not listing order).
/// 3. [`Complete`](Self::Complete), exactly once, with the final totals.
///
/// A run-level failure terminates the stream with an `Err` item, in which
/// case [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Scanning has begun; emitted exactly once before any other event.
    Started,
    /// An object has been processed (or skipped, or has failed).
    Processed(FileReport),
    /// The listing yielded an error in place of an object.
    ListingFailed(String),
    /// Every candidate object has been processed; the stream is finished.
    Complete(ScanProgress),
}

/// Whichever of the listing and the in-flight set was ready first.
enum Step {
    Listed(Option<StorageResult<ObjectInfo>>),
    Processed(FileReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Bypass the scan cache gate and re-extract everything.
    pub force: bool,
    /// Stop enumerating after this many candidate objects.
    pub limit: Option<u64>,
}

/// Streams [`ScanEvent`]s for every candidate object in the context's
/// source.
///
/// Objects are processed concurrently, up to the configured concurrency, as
/// the listing produces them. Per-object failures are reported in
/// [`FileReport`]s without terminating the stream; only an unusable staging
/// directory or a listing that fails on its very first entry is fatal.
/// Cancelling the context stops enumeration, and objects already in flight
/// are drained.
pub fn scan_stream<'a>(ctx: &'a Context, options: ScanOptions) -> impl Stream<Item = LibraryResult<ScanEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ScanEvent::Started);
        tracing::info!(
            source = ctx.source.name(),
            bucket = ctx.source.bucket(),
            prefix = ?ctx.prefix,
            force = options.force,
            limit = ?options.limit,
            "scan started"
        );

        if let Err(err) = ctx.extractor.stager().check() {
            yield Err(err).or_raise(|| ErrorKind::Setup);
            return;
        }

        let mut listing = ctx.source.list_stream(ctx.prefix.as_deref());
        let mut processing = FuturesUnordered::new();
        let mut progress = ScanProgress::default();
        let mut enumerated: u64 = 0;
        let mut listed_any = false;
        let mut exhausted = false;
        loop {
            if !exhausted && (ctx.cancel.is_cancelled() || options.limit.is_some_and(|limit| enumerated >= limit)) {
                exhausted = true;
            }
            let can_list = !exhausted && processing.len() < ctx.concurrency;
            // Drain finished work first, but keep extracting while a slow
            // listing is still producing.
            let step = tokio::select! {
                biased;
                Some(report) = processing.next(), if !processing.is_empty() => Step::Processed(report),
                entry = listing.next(), if can_list => Step::Listed(entry),
                else => break,
            };
            match step {
                Step::Processed(report) => {
                    progress += ScanProgress::from(&report);
                    yield Ok(ScanEvent::Processed(report));
                },
                Step::Listed(Some(Ok(object))) => {
                    listed_any = true;
                    enumerated += 1;
                    processing.push(async move { scan_object(ctx, &object, options.force).await });
                },
                Step::Listed(Some(Err(err))) if !listed_any => {
                    yield Err(err).or_raise(|| ErrorKind::Listing);
                    return;
                },
                Step::Listed(Some(Err(err))) => {
                    tracing::warn!(error = %err, "unable to list object");
                    progress += ScanProgress::listing_error();
                    yield Ok(ScanEvent::ListingFailed(err.to_string()));
                },
                Step::Listed(None) => exhausted = true,
            }
        }

        if ctx.cancel.is_cancelled() {
            tracing::info!("scan cancelled; stopped enumerating");
        }
        tracing::info!(
            total = progress.total_files,
            scanned = progress.scanned_files,
            new = progress.new_songs,
            updated = progress.updated_songs,
            unchanged = progress.unchanged_songs,
            skipped = progress.skipped_files,
            interrupted = progress.interrupted_files,
            errors = progress.errors,
            "scan complete"
        );
        yield Ok(ScanEvent::Complete(progress));
    })
}

/// Scan the context's source to completion.
///
/// `on_progress` is called every `progress_interval` processed objects and
/// once more at the end unless the last call already carried the final
/// totals, which are also returned.
pub async fn scan(
    ctx: &Context,
    options: ScanOptions,
    mut on_progress: impl FnMut(&ScanProgress),
) -> LibraryResult<ScanProgress> {
    let interval = ctx.progress_interval.max(1);
    let mut events = std::pin::pin!(scan_stream(ctx, options));
    let mut progress = ScanProgress::default();
    let mut reported = None;
    while let Some(event) = events.next().await {
        let contribution = match event? {
            ScanEvent::Started => continue,
            ScanEvent::Processed(report) => ScanProgress::from(&report),
            ScanEvent::ListingFailed(_) => ScanProgress::listing_error(),
            ScanEvent::Complete(total) => {
                progress = total;
                break;
            },
        };
        progress += contribution;
        if progress.total_files % interval == 0 {
            on_progress(&progress);
            reported = Some(progress);
        }
    }
    if reported != Some(progress) {
        on_progress(&progress);
    }
    Ok(progress)
}
