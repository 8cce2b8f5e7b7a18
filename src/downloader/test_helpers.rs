//! Shared test helpers: mock collaborators and a manager wired to them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::{TempDir, tempdir};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::downloader::DownloadManager;
use crate::error::{Error, Result, TransportError};
use crate::providers::{LyricProvider, NoLyrics, UrlResolver};
use crate::transport::{ProgressCallback, TransportPrimitive};
use crate::types::{DownloadUpdate, Event, MusicItem, Quality, Status, TaskId};

/// How long event helpers wait before failing a test
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolver that answers `mock://<id>/<quality>` unless told otherwise
#[derive(Default)]
pub(crate) struct MockResolver {
    missing: Mutex<HashSet<TaskId>>,
    failing: Mutex<HashSet<TaskId>>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub(crate) fn url_for(id: &str, quality: Quality) -> String {
        format!("mock://{}/{}", id, quality.code())
    }

    /// Resolve `id` to no URL
    pub(crate) fn set_missing(&self, id: &str) {
        self.missing.lock().unwrap().insert(TaskId::from(id));
    }

    /// Fail resolution of `id` with a provider error
    pub(crate) fn set_failing(&self, id: &str) {
        self.failing.lock().unwrap().insert(TaskId::from(id));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UrlResolver for MockResolver {
    async fn resolve(&self, item: &MusicItem, quality: Quality) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&item.id) {
            return Err(Error::Provider(format!("source rejected {}", item.id)));
        }
        if self.missing.lock().unwrap().contains(&item.id) {
            return Ok(None);
        }
        Ok(Some(Self::url_for(item.id.as_str(), quality)))
    }
}

/// Transfer primitive that writes `chunks * CHUNK_SIZE` bytes in steps
///
/// With a gate installed every transfer waits for one gate permit before writing,
/// which lets tests hold tasks in Downloading for as long as they need.
pub(crate) struct MockTransport {
    chunks: u64,
    chunk_delay: Duration,
    gate: Option<Arc<Semaphore>>,
    failing: Mutex<HashSet<String>>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

pub(crate) const CHUNK_SIZE: usize = 16;

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            chunks: 4,
            chunk_delay: Duration::from_millis(5),
            gate: None,
            failing: Mutex::new(HashSet::new()),
            urls: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every transfer until the returned semaphore receives a permit
    pub(crate) fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) fn with_chunks(mut self, chunks: u64, delay: Duration) -> Self {
        self.chunks = chunks;
        self.chunk_delay = delay;
        self
    }

    /// Fail transfers of `url` with HTTP 500 after the first chunk
    pub(crate) fn fail_url(&self, url: String) {
        self.failing.lock().unwrap().insert(url);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.chunks * CHUNK_SIZE as u64
    }
}

/// Decrements the running counter however the transfer ends
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TransportPrimitive for MockTransport {
    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        on_progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> std::result::Result<u64, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(Arc::clone(&self.running));

        let mut file = tokio::fs::File::create(destination).await?;

        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                permit = gate.acquire() => permit.unwrap().forget(),
            }
        }

        let total = self.total_bytes();
        let fail = self.failing.lock().unwrap().contains(url);
        let mut written = 0u64;
        for chunk in 0..self.chunks {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            if fail && chunk == 1 {
                file.flush().await?;
                return Err(TransportError::Http { status: 500 });
            }
            tokio::time::sleep(self.chunk_delay).await;
            file.write_all(&[b'x'; CHUNK_SIZE]).await?;
            written += CHUNK_SIZE as u64;
            on_progress(written, Some(total));
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Lyric provider returning fixed text
pub(crate) struct StaticLyrics(pub(crate) &'static str);

#[async_trait::async_trait]
impl LyricProvider for StaticLyrics {
    async fn fetch_lyric(&self, _item: &MusicItem) -> Result<Option<String>> {
        Ok(Some(self.0.to_string()))
    }
}

/// Lyric provider that always fails
pub(crate) struct FailingLyrics;

#[async_trait::async_trait]
impl LyricProvider for FailingLyrics {
    async fn fetch_lyric(&self, item: &MusicItem) -> Result<Option<String>> {
        Err(Error::Provider(format!("lyric service down for {}", item.id)))
    }
}

/// Manager plus the mocks it was built with
pub(crate) struct TestHarness {
    pub(crate) manager: DownloadManager,
    pub(crate) resolver: Arc<MockResolver>,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) save_dir: PathBuf,
    // Keeps the directory alive for the test's duration
    pub(crate) _temp_dir: TempDir,
}

impl TestHarness {
    pub(crate) fn path_of(&self, file_name: &str) -> PathBuf {
        self.save_dir.join(file_name)
    }
}

/// Config whose save directory lives inside `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.settings.save_dir = dir.join("downloads");
    config.max_concurrent_downloads = 3;
    config
}

/// Manager with default test collaborators
pub(crate) fn create_test_manager() -> TestHarness {
    create_test_manager_with(|_| {}, MockTransport::new(), Arc::new(NoLyrics))
}

/// Manager with a customized config, transport and lyric provider
pub(crate) fn create_test_manager_with(
    configure: impl FnOnce(&mut Config),
    transport: MockTransport,
    lyrics: Arc<dyn LyricProvider>,
) -> TestHarness {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);
    let save_dir = config.settings.save_dir.clone();

    let resolver = Arc::new(MockResolver::default());
    let transport = Arc::new(transport);

    let manager = DownloadManager::builder(config)
        .resolver(resolver.clone())
        .transport(transport.clone())
        .lyrics(lyrics)
        .build()
        .unwrap();

    TestHarness {
        manager,
        resolver,
        transport,
        save_dir,
        _temp_dir: temp_dir,
    }
}

pub(crate) fn item(id: &str) -> MusicItem {
    MusicItem::new(id, format!("Song {}", id), "Artist")
}

/// Receive events until `pred` matches; returns everything received, including the match
pub(crate) async fn collect_until(
    rx: &mut broadcast::Receiver<Event>,
    mut pred: impl FnMut(&Event) -> bool,
) -> Vec<Event> {
    let mut events = Vec::new();
    let result = tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            let event = rx.recv().await.unwrap();
            let done = pred(&event);
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for event; got {:?}", events);
    events
}

/// Wait for an update that moves `id` into `status`
pub(crate) async fn wait_for_status(
    rx: &mut broadcast::Receiver<Event>,
    id: &str,
    status: Status,
) -> DownloadUpdate {
    let id = TaskId::from(id);
    let events = collect_until(rx, |event| {
        matches!(event, Event::Update(u) if u.id == id && u.status == status)
    })
    .await;
    match events.into_iter().last() {
        Some(Event::Update(update)) => update,
        other => panic!("unexpected final event {:?}", other),
    }
}

/// Updates for `id` in `events`, in order
pub(crate) fn updates_for(events: &[Event], id: &str) -> Vec<DownloadUpdate> {
    let id = TaskId::from(id);
    events
        .iter()
        .filter_map(|event| match event {
            Event::Update(u) if u.id == id => Some(u.clone()),
            _ => None,
        })
        .collect()
}

/// Statuses of `id` with consecutive repeats (progress ticks) collapsed
pub(crate) fn status_sequence(events: &[Event], id: &str) -> Vec<Status> {
    let mut statuses: Vec<Status> = Vec::new();
    for update in updates_for(events, id) {
        if statuses.last() != Some(&update.status) {
            statuses.push(update.status);
        }
    }
    statuses
}

/// Map of id to final status over a set of events
pub(crate) fn final_statuses(events: &[Event]) -> HashMap<TaskId, Status> {
    let mut statuses = HashMap::new();
    for event in events {
        if let Event::Update(u) = event {
            statuses.insert(u.id.clone(), u.status);
        }
    }
    statuses
}

/// Poll until the manager holds no record for `id`
pub(crate) async fn wait_until_gone(manager: &DownloadManager, id: &str) {
    let id = TaskId::from(id);
    let gone = tokio::time::timeout(EVENT_TIMEOUT, async {
        while manager.get_task(&id).await.is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(gone.is_ok(), "task {} was never removed", id);
}

/// Wait for the first Downloading update of `id` with progress above zero
pub(crate) async fn wait_for_progress(rx: &mut broadcast::Receiver<Event>, id: &str) -> f64 {
    let id = TaskId::from(id);
    let events = collect_until(rx, |event| {
        matches!(event, Event::Update(u)
            if u.id == id && u.status == Status::Downloading && u.progress.unwrap_or(0.0) > 0.0)
    })
    .await;
    match events.into_iter().last() {
        Some(Event::Update(update)) => update.progress.unwrap_or(0.0),
        other => panic!("unexpected final event {:?}", other),
    }
}
