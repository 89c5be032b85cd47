//! End-to-end scans against an in-memory source, an in-memory catalog and
//! scripted decoders.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tuneshelf_cache::{Database, UpsertOutcome};
use tuneshelf_config::Config;
use tuneshelf_extract::{CanonicalMetadata, duration};
use tuneshelf_library::budget::FixedBudget;
use tuneshelf_library::error::ErrorKind as LibraryErrorKind;
use tuneshelf_library::extraction::error::{ErrorKind, Result};
use tuneshelf_library::extraction::{MetadataDecoder, Placement, SubprocessDecoder};
use tuneshelf_library::scan::{FileState, ScanEvent, ScanOptions, ScanProgress, scan, scan_stream};
use tuneshelf_library::{Context, ContextBuilder};
use tuneshelf_storage::{ByteRange, ObjectHead, ObjectInfo, ObjectSource};
use tuneshelf_storage::backend::{LocalBackend, MockBackend};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Parse `artist|album|title|seconds`; content starting `FAIL` fails.
    Fixture,
    /// Every decode fails.
    Broken,
    /// Report 8 bps and no duration, then estimate from the size hint the
    /// way the tag decoder does (one second per byte).
    Estimating,
    /// Duration of one second per byte, but only from an intact file; a
    /// reconstructed one (zero-filled middle) yields nothing usable.
    NeedsWholeFile,
}

struct ScriptedDecoder {
    mode: Mode,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataDecoder for ScriptedDecoder {
    async fn decode(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(path).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        match self.mode {
            Mode::Broken => exn::bail!(ErrorKind::Decode),
            Mode::Estimating => {
                let mut metadata = CanonicalMetadata {
                    bitrate: Some(8),
                    ..Default::default()
                };
                duration::apply(&mut metadata, size_hint);
                Ok(metadata)
            },
            Mode::NeedsWholeFile if bytes.contains(&0) => Ok(CanonicalMetadata::default()),
            Mode::NeedsWholeFile => Ok(CanonicalMetadata {
                duration: bytes.len() as f64,
                ..Default::default()
            }),
            Mode::Fixture if text.starts_with("FAIL") => exn::bail!(ErrorKind::Decode),
            Mode::Fixture => {
                let fields: Vec<&str> = text.trim().split('|').collect();
                let [artist, album, title, seconds] = fields.as_slice() else {
                    exn::bail!(ErrorKind::Decode);
                };
                let present = |value: &&str| (!value.is_empty()).then(|| value.to_string());
                Ok(CanonicalMetadata {
                    artist: present(artist),
                    album: present(album),
                    title: present(title),
                    duration: seconds.parse().unwrap(),
                    ..Default::default()
                })
            },
        }
    }
}

/// Lists like the wrapped source, but holds back every entry after the first
/// until `release` is notified.
struct HeldBackListing {
    inner: Arc<MockBackend>,
    release: Arc<Notify>,
}

#[async_trait]
impl ObjectSource for HeldBackListing {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn list_stream<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> Pin<Box<dyn Stream<Item = tuneshelf_storage::error::Result<ObjectInfo>> + Send + 'a>> {
        let mut first = true;
        Box::pin(self.inner.list_stream(prefix).then(move |item| {
            let hold = !std::mem::replace(&mut first, false);
            async move {
                if hold {
                    self.release.notified().await;
                }
                item
            }
        }))
    }

    async fn get(&self, key: &str, destination: &Path) -> tuneshelf_storage::error::Result<u64> {
        self.inner.get(key, destination).await
    }

    async fn get_range(&self, key: &str, range: ByteRange) -> tuneshelf_storage::error::Result<Vec<u8>> {
        self.inner.get_range(key, range).await
    }

    async fn head(&self, key: &str) -> tuneshelf_storage::error::Result<Option<ObjectHead>> {
        self.inner.head(key).await
    }
}

/// Notifies after every decode it forwards.
struct Signalling {
    inner: Arc<ScriptedDecoder>,
    decoded: Arc<Notify>,
}

#[async_trait]
impl MetadataDecoder for Signalling {
    async fn decode(&self, path: &Path, size_hint: Option<u64>) -> Result<CanonicalMetadata> {
        let result = self.inner.decode(path, size_hint).await;
        self.decoded.notify_one();
        result
    }
}

struct Harness {
    temp: TempDir,
    source: Arc<MockBackend>,
    db: Database,
    config: Config,
    in_process: Arc<ScriptedDecoder>,
    subprocess: Arc<ScriptedDecoder>,
}

impl Harness {
    async fn new(objects: Vec<(&str, &str)>) -> Self {
        Self::with_modes(objects, Mode::Fixture, Mode::Fixture).await
    }

    async fn with_modes(objects: Vec<(&str, &str)>, in_process: Mode, subprocess: Mode) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.extraction.temp_dir = Some(temp.path().to_path_buf());
        config.scan.special_folders = vec!["Xmas".to_string()];
        Self {
            temp,
            source: Arc::new(MockBackend::with_objects(objects)),
            db: Database::connect_in_memory().await.unwrap(),
            config,
            in_process: ScriptedDecoder::new(in_process),
            subprocess: ScriptedDecoder::new(subprocess),
        }
    }

    fn builder(&self) -> ContextBuilder<'_> {
        Context::builder(self.source.clone(), &self.db, &self.config)
            .budget(Arc::new(FixedBudget::unknown()))
            .in_process_decoder(self.in_process.clone())
            .subprocess_decoder(self.subprocess.clone())
    }

    fn context(&self) -> Context {
        self.builder().build().unwrap()
    }

    async fn scan(&self, options: ScanOptions) -> ScanProgress {
        scan(&self.context(), options, |_| {}).await.unwrap()
    }

    async fn reports(&self, options: ScanOptions) -> Vec<tuneshelf_library::scan::FileReport> {
        let ctx = self.context();
        scan_stream(&ctx, options)
            .filter_map(|event| async move {
                match event.unwrap() {
                    ScanEvent::Processed(report) => Some(report),
                    _ => None,
                }
            })
            .collect()
            .await
    }
}

#[tokio::test]
async fn test_new_object_end_to_end() {
    let h = Harness::new(vec![("Rock/Choir/a.mp3", "Choir|Carols|Silent Night|180.5")]).await;
    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(
        progress,
        ScanProgress {
            total_files: 1,
            scanned_files: 1,
            new_songs: 1,
            ..Default::default()
        }
    );

    let ctx = h.context();
    let catalog = ctx.catalog();
    assert_eq!(catalog.count_songs().await.unwrap(), 1);
    assert_eq!(catalog.count_artists().await.unwrap(), 1);
    assert_eq!(catalog.count_albums().await.unwrap(), 1);
    let song = catalog.song_by_path("Rock/Choir/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.title, "Silent Night");
    assert_eq!(song.record.length, 180.5);
    assert_eq!(song.record.mime_type, "audio/mpeg");
    let folder = catalog.smart_folder_by_prefix("Rock").await.unwrap().unwrap();
    assert_eq!(song.record.smart_folder_id, Some(folder.id));

    let head = h.source.head("Rock/Choir/a.mp3").await.unwrap().unwrap();
    let entry = ctx.cache().get(h.source.bucket(), "Rock/Choir/a.mp3").await.unwrap().unwrap();
    assert_eq!(entry.etag.as_deref(), Some(head.etag.as_str()));
    assert_eq!(entry.size, Some(head.size));
}

#[tokio::test]
async fn test_unchanged_objects_are_not_extracted_again() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10"), ("Rock/b.mp3", "A|B|D|20")]).await;
    h.scan(ScanOptions::default()).await;
    assert_eq!(h.in_process.calls(), 2);
    let before = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();

    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.skipped_files, 2);
    assert_eq!(progress.scanned_files, 0);
    assert_eq!(h.in_process.calls(), 2);
    assert_eq!(h.source.full_reads(), 2);
    let after = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_etag_change_triggers_extraction() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10"), ("Rock/b.mp3", "A|B|D|20")]).await;
    h.scan(ScanOptions::default()).await;
    h.source.set_etag("Rock/a.mp3", "new-etag").await.unwrap();

    let reports = h.reports(ScanOptions::default()).await;
    let changed = reports.iter().find(|report| report.key == "Rock/a.mp3").unwrap();
    let unchanged = reports.iter().find(|report| report.key == "Rock/b.mp3").unwrap();
    assert_eq!(changed.state, FileState::CacheUpdated);
    // Same content, new fingerprint: the song row is rewritten only where it differs.
    assert_eq!(changed.outcome, Some(UpsertOutcome::Updated));
    assert_eq!(unchanged.state, FileState::Skipped);
    assert_eq!(h.in_process.calls(), 3);
}

#[tokio::test]
async fn test_content_change_updates_song() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10")]).await;
    h.scan(ScanOptions::default()).await;
    // Different length, different etag.
    h.source.put("Rock/a.mp3", "A|B|Renamed Song|10").await.unwrap();

    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.updated_songs, 1);
    let song = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.title, "Renamed Song");
    assert_eq!(h.context().catalog().count_songs().await.unwrap(), 1);
}

#[tokio::test]
async fn test_size_change_alone_triggers_extraction() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10")]).await;
    h.scan(ScanOptions::default()).await;
    let old = h.source.head("Rock/a.mp3").await.unwrap().unwrap();
    h.source.put("Rock/a.mp3", "A|B|Longer Title|10").await.unwrap();
    h.source.set_etag("Rock/a.mp3", old.etag.clone()).await.unwrap();
    let new = h.source.head("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(new.etag, old.etag);
    assert_ne!(new.size, old.size);

    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.skipped_files, 0);
    assert_eq!(progress.updated_songs, 1);
    assert_eq!(h.in_process.calls(), 2);
    let song = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.title, "Longer Title");
}

#[tokio::test]
async fn test_force_bypasses_the_gate() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10")]).await;
    h.scan(ScanOptions::default()).await;
    let progress = h
        .scan(ScanOptions {
            force: true,
            limit: None,
        })
        .await;
    assert_eq!(progress.unchanged_songs, 1);
    assert_eq!(progress.skipped_files, 0);
    assert_eq!(h.in_process.calls(), 2);
}

#[tokio::test]
async fn test_in_process_failure_falls_back_to_worker() {
    let h = Harness::with_modes(vec![("Rock/a.mp3", "A|B|C|10")], Mode::Broken, Mode::Fixture).await;
    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.new_songs, 1);
    assert_eq!(h.in_process.calls(), 1);
    assert_eq!(h.subprocess.calls(), 1);
}

#[tokio::test]
async fn test_memory_intensive_format_uses_worker_only() {
    let h = Harness::new(vec![("Rock/a.flac", "A|B|C|10")]).await;
    let reports = h.reports(ScanOptions::default()).await;
    assert_eq!(reports[0].plan.as_ref().unwrap().placement, Placement::Subprocess);
    assert_eq!(h.in_process.calls(), 0);
    assert_eq!(h.subprocess.calls(), 1);
}

#[tokio::test]
async fn test_partial_duration_estimated_from_listed_size() {
    let mut h = Harness::with_modes(vec![("Rock/a.mp3", "0123456789abcdef")], Mode::Estimating, Mode::Broken).await;
    h.config.extraction.header_bytes = 4;
    h.config.extraction.footer_bytes = 4;

    let reports = h.reports(ScanOptions::default()).await;
    assert_eq!(reports[0].outcome, Some(UpsertOutcome::New));
    assert_eq!(h.source.range_reads(), 2);
    assert_eq!(h.source.full_reads(), 0);
    assert_eq!(h.in_process.calls(), 1);
    let song = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.length, 16.0);
}

#[tokio::test]
async fn test_partial_without_duration_downloads_whole_object() {
    let mut h = Harness::with_modes(vec![("Rock/a.mp3", "0123456789abcdef")], Mode::NeedsWholeFile, Mode::Broken).await;
    h.config.extraction.header_bytes = 4;
    h.config.extraction.footer_bytes = 4;

    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.new_songs, 1);
    assert_eq!(h.source.range_reads(), 2);
    assert_eq!(h.source.full_reads(), 1);
    // A successful decode without a duration is not a failure: no worker,
    // straight to the whole object.
    assert_eq!(h.in_process.calls(), 2);
    assert_eq!(h.subprocess.calls(), 0);
    let song = h.context().catalog().song_by_path("Rock/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.length, 16.0);
}

#[tokio::test]
async fn test_smart_folders() {
    let h = Harness::new(vec![
        ("Rock/Artist/a.mp3", "A|B|C|10"),
        ("Xmas/Contemporary/Artist/b.mp3", "A|B|D|10"),
        ("Xmas/c.mp3", "A|B|E|10"),
        ("d.mp3", "A|B|F|10"),
    ])
    .await;
    h.scan(ScanOptions::default()).await;

    let ctx = h.context();
    let catalog = ctx.catalog();
    let rock = catalog.smart_folder_by_prefix("Rock").await.unwrap().unwrap();
    let xmas = catalog.smart_folder_by_prefix("Xmas").await.unwrap().unwrap();
    let contemporary = catalog.smart_folder_by_prefix("Xmas/Contemporary").await.unwrap().unwrap();
    assert!(!rock.is_special);
    assert!(xmas.is_special && contemporary.is_special);
    assert_eq!(contemporary.parent_id, Some(xmas.id));
    assert_eq!(catalog.count_smart_folders().await.unwrap(), 3);

    let folder_of = |key: &'static str| async move { catalog.song_by_path(key).await.unwrap().unwrap().record.smart_folder_id };
    assert_eq!(folder_of("Rock/Artist/a.mp3").await, Some(rock.id));
    assert_eq!(folder_of("Xmas/Contemporary/Artist/b.mp3").await, Some(contemporary.id));
    assert_eq!(folder_of("Xmas/c.mp3").await, Some(xmas.id));
    assert_eq!(folder_of("d.mp3").await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_failure_does_not_abort_the_run() {
    let mut objects: Vec<(String, String)> =
        (0..9).map(|i| (format!("Rock/{i}.mp3"), format!("Artist|Album|Song {i}|{}", i + 1))).collect();
    objects.push(("Rock/broken.mp3".to_string(), "FAIL".to_string()));
    let objects: Vec<(&str, &str)> = objects.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let h = Harness::new(objects).await;

    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.total_files, 10);
    assert_eq!(progress.errors, 1);
    assert_eq!(progress.scanned_files, 9);
    assert_eq!(progress.new_songs, 9);
    // Shared artist and album despite concurrent creation.
    assert_eq!(h.context().catalog().count_artists().await.unwrap(), 1);
    assert_eq!(h.context().catalog().count_albums().await.unwrap(), 1);

    // The failed object was not committed to the cache, so it is retried.
    let ctx = h.context();
    let entry = ctx.cache().get(h.source.bucket(), "Rock/broken.mp3").await.unwrap().unwrap();
    assert_eq!(entry.etag, None);
    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.skipped_files, 9);
    assert_eq!(progress.errors, 1);
}

#[tokio::test]
async fn test_failed_report_carries_cause() {
    let h = Harness::new(vec![("Rock/broken.mp3", "FAIL")]).await;
    let reports = h.reports(ScanOptions::default()).await;
    assert!(reports[0].is_error());
    let error = reports[0].error.as_deref().unwrap();
    assert!(error.contains("extraction failed"), "{error}");
}

#[tokio::test]
async fn test_limit_stops_enumeration() {
    let objects: Vec<(String, String)> = (0..10).map(|i| (format!("{i}.mp3"), format!("A|B|{i}|1"))).collect();
    let objects: Vec<(&str, &str)> = objects.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let h = Harness::new(objects).await;
    let progress = h
        .scan(ScanOptions {
            force: false,
            limit: Some(3),
        })
        .await;
    assert_eq!(progress.total_files, 3);
    assert_eq!(h.context().catalog().count_songs().await.unwrap(), 3);
}

#[tokio::test]
async fn test_extension_allow_list() {
    let h = Harness::new(vec![("Rock/a.mp3", "A|B|C|10"), ("Rock/cover.jpg", "not audio"), ("Rock/notes", "x")]).await;
    let progress = h.scan(ScanOptions::default()).await;
    assert_eq!(progress.total_files, 1);
    assert_eq!(progress.errors, 0);
}

#[tokio::test]
async fn test_progress_callback() {
    let objects: Vec<(String, String)> = (0..5).map(|i| (format!("{i}.mp3"), format!("A|B|{i}|1"))).collect();
    let objects: Vec<(&str, &str)> = objects.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut h = Harness::new(objects).await;
    h.config.scan.progress_interval = 2;

    let mut seen = Vec::new();
    let total = scan(&h.context(), ScanOptions::default(), |progress| seen.push(progress.total_files))
        .await
        .unwrap();
    assert_eq!(seen, vec![2, 4, 5]);
    assert_eq!(total.total_files, 5);
}

#[tokio::test]
async fn test_final_progress_is_not_repeated() {
    let objects: Vec<(String, String)> = (0..4).map(|i| (format!("{i}.mp3"), format!("A|B|{i}|1"))).collect();
    let objects: Vec<(&str, &str)> = objects.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut h = Harness::new(objects).await;
    h.config.scan.progress_interval = 2;

    let mut seen = Vec::new();
    let total = scan(&h.context(), ScanOptions::default(), |progress| seen.push(*progress)).await.unwrap();
    assert_eq!(seen.iter().map(|progress| progress.total_files).collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(seen.last(), Some(&total));
}

#[tokio::test]
async fn test_extraction_proceeds_while_listing_is_held_back() {
    let h = Harness::new(vec![("a.mp3", "A|B|C|1"), ("b.mp3", "A|B|D|1")]).await;
    let release = Arc::new(Notify::new());
    let source = Arc::new(HeldBackListing {
        inner: h.source.clone(),
        release: release.clone(),
    });
    let decoder = Arc::new(Signalling {
        inner: h.in_process.clone(),
        decoded: release,
    });
    let ctx = Context::builder(source, &h.db, &h.config)
        .budget(Arc::new(FixedBudget::unknown()))
        .in_process_decoder(decoder)
        .subprocess_decoder(h.subprocess.clone())
        .build()
        .unwrap();

    // The second entry is only listed once the first has been decoded.
    let progress = tokio::time::timeout(std::time::Duration::from_secs(10), scan(&ctx, ScanOptions::default(), |_| {}))
        .await
        .expect("listing and extraction deadlocked")
        .unwrap();
    assert_eq!(progress.new_songs, 2);
    assert_eq!(h.in_process.calls(), 2);
}

#[tokio::test]
async fn test_event_order() {
    let h = Harness::new(vec![("a.mp3", "A|B|C|1"), ("b.mp3", "A|B|D|1")]).await;
    let ctx = h.context();
    let events: Vec<ScanEvent> = scan_stream(&ctx, ScanOptions::default()).map(|event| event.unwrap()).collect().await;
    assert!(matches!(events.first(), Some(ScanEvent::Started)));
    assert!(matches!(events.last(), Some(ScanEvent::Complete(progress)) if progress.new_songs == 2));
    assert_eq!(events.iter().filter(|event| matches!(event, ScanEvent::Processed(_))).count(), 2);
}

#[tokio::test]
async fn test_cancelled_scan_enumerates_nothing() {
    let h = Harness::new(vec![("a.mp3", "A|B|C|1")]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = h.builder().cancellation(cancel).build().unwrap();
    let progress = scan(&ctx, ScanOptions::default(), |_| {}).await.unwrap();
    assert_eq!(progress, ScanProgress::default());
    assert_eq!(h.in_process.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_worker_launch_leaves_cache_stale() {
    let h = Harness::new(vec![("a.flac", "A|B|C|1")]).await;
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let worker = SubprocessDecoder::new("/nonexistent/worker", std::time::Duration::from_secs(1), cancelled);
    let ctx = h.builder().subprocess_decoder(Arc::new(worker)).build().unwrap();

    let progress = scan(&ctx, ScanOptions::default(), |_| {}).await.unwrap();
    assert_eq!(progress.interrupted_files, 1);
    assert_eq!(progress.errors, 0);
    let entry = ctx.cache().get(h.source.bucket(), "a.flac").await.unwrap().unwrap();
    assert_eq!(entry.etag, None);
    assert_eq!(ctx.catalog().count_songs().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unusable_staging_directory_is_fatal() {
    let mut h = Harness::new(vec![("a.mp3", "A|B|C|1")]).await;
    h.config.extraction.temp_dir = Some(h.temp.path().join("missing"));
    let err = scan(&h.context(), ScanOptions::default(), |_| {}).await.unwrap_err();
    assert_eq!(*err, LibraryErrorKind::Setup);
}

#[tokio::test]
async fn test_listing_that_cannot_start_is_fatal() {
    let h = Harness::new(vec![]).await;
    let root = TempDir::new().unwrap();
    let source = Arc::new(LocalBackend::new("local", root.path()).unwrap());
    let mut config = h.config.clone();
    config.scan.prefix = Some("../outside".to_string());
    let ctx = Context::builder(source, &h.db, &config)
        .in_process_decoder(h.in_process.clone())
        .subprocess_decoder(h.subprocess.clone())
        .build()
        .unwrap();
    let err = scan(&ctx, ScanOptions::default(), |_| {}).await.unwrap_err();
    assert_eq!(*err, LibraryErrorKind::Listing);
}

#[tokio::test]
async fn test_local_source_end_to_end() {
    let h = Harness::new(vec![]).await;
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("Jazz")).unwrap();
    std::fs::write(root.path().join("Jazz/a.mp3"), "Miles|Kind of Blue|So What|545").unwrap();
    let source = Arc::new(LocalBackend::new("local", root.path()).unwrap());
    let ctx = Context::builder(source, &h.db, &h.config)
        .budget(Arc::new(FixedBudget::unknown()))
        .in_process_decoder(h.in_process.clone())
        .subprocess_decoder(h.subprocess.clone())
        .build()
        .unwrap();

    let progress = scan(&ctx, ScanOptions::default(), |_| {}).await.unwrap();
    assert_eq!(progress.new_songs, 1);
    let song = ctx.catalog().song_by_path("Jazz/a.mp3").await.unwrap().unwrap();
    assert_eq!(song.record.title, "So What");
    assert_eq!(ctx.catalog().artist_by_name("miles").await.unwrap().unwrap().name, "Miles");
}
