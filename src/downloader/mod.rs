//! Download manager split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`request`] - Download requests, dedup, existing-file short-circuit, batches
//! - [`queue`] - FIFO admission queue (enqueue, removal, promotion)
//! - [`queue_processor`] - Slot acquisition and worker spawning
//! - [`download_task`] - One lifecycle: resolve, transfer, finalize, lyrics
//! - [`control`] - Pause / resume / cancel
//! - [`config_ops`] - Settings access and runtime updates
//! - [`lifecycle`] - Shutdown coordination

mod config_ops;
mod control;
mod download_task;
mod lifecycle;
mod queue;
mod queue_processor;
mod request;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, SettingsStore, SharedSettings};
use crate::error::{Error, Result};
use crate::providers::{Filesystem, LyricProvider, NoLyrics, TokioFilesystem, UrlResolver};
use crate::registry::TaskRegistry;
use crate::transport::{HttpTransport, TransportAdapter, TransportPrimitive};
use crate::types::{CancelHandle, DownloadTask, Event, QueueStats, Status, TaskHandle, TaskId};

/// Entry in the admission queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) instance: u64,
}

/// Admission queue and worker bookkeeping
#[derive(Clone)]
pub(crate) struct QueueState {
    /// FIFO of Pending tasks waiting for a slot
    pub(crate) queue: Arc<Mutex<VecDeque<QueuedTask>>>,
    /// Wakes the queue processor when something is enqueued
    pub(crate) queue_notify: Arc<Notify>,
    /// Bounds simultaneously transferring tasks (max_concurrent_downloads)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Workers currently holding a slot, keyed by lifecycle, with their stop handles
    pub(crate) active_downloads: Arc<Mutex<HashMap<TaskHandle, CancelHandle>>>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Source of lifecycle instance numbers
    pub(crate) next_instance: Arc<AtomicU64>,
    /// Stops the queue processor
    pub(crate) processor_shutdown: CancellationToken,
}

/// Collaborators the manager calls out to
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) resolver: Arc<dyn UrlResolver>,
    pub(crate) lyrics: Arc<dyn LyricProvider>,
    pub(crate) filesystem: Arc<dyn Filesystem>,
    pub(crate) transport: TransportAdapter,
}

/// Download task manager (cloneable - all fields are Arc-wrapped)
///
/// Construct one per process with [`DownloadManager::builder`] or
/// [`DownloadManager::new`] and pass clones to whoever needs it.
#[derive(Clone)]
pub struct DownloadManager {
    /// Working set of active and resumable tasks
    pub(crate) registry: Arc<TaskRegistry>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Static configuration
    pub(crate) config: Arc<Config>,
    /// Settings consulted on every request
    pub(crate) settings: Arc<dyn SettingsStore>,
    /// Present when the manager owns its settings (no external store was supplied)
    pub(crate) shared_settings: Option<SharedSettings>,
    /// External collaborators
    pub(crate) services: Services,
    /// Admission queue and worker bookkeeping
    pub(crate) queue_state: QueueState,
}

/// Builder for [`DownloadManager`]
pub struct DownloadManagerBuilder {
    config: Config,
    resolver: Option<Arc<dyn UrlResolver>>,
    lyrics: Arc<dyn LyricProvider>,
    filesystem: Arc<dyn Filesystem>,
    transport: Option<Arc<dyn TransportPrimitive>>,
    settings: Option<Arc<dyn SettingsStore>>,
}

impl DownloadManagerBuilder {
    /// URL resolver (required)
    pub fn resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Lyric provider (default: [`NoLyrics`])
    pub fn lyrics(mut self, lyrics: Arc<dyn LyricProvider>) -> Self {
        self.lyrics = lyrics;
        self
    }

    /// Filesystem (default: [`TokioFilesystem`])
    pub fn filesystem(mut self, filesystem: Arc<dyn Filesystem>) -> Self {
        self.filesystem = filesystem;
        self
    }

    /// Transfer primitive (default: [`HttpTransport`] built from `config.transport`)
    pub fn transport(mut self, transport: Arc<dyn TransportPrimitive>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// External settings store (default: [`SharedSettings`] seeded from `config.settings`)
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validate the configuration, wire collaborators and start the queue processor
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<DownloadManager> {
        self.config.validate()?;

        let resolver = self.resolver.ok_or_else(|| Error::Config {
            message: "a URL resolver is required".to_string(),
            key: Some("resolver".to_string()),
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config.transport)?),
        };

        let (settings, shared_settings): (Arc<dyn SettingsStore>, Option<SharedSettings>) =
            match self.settings {
                Some(settings) => (settings, None),
                None => {
                    let shared = SharedSettings::new(self.config.settings.clone());
                    (Arc::new(shared.clone()), Some(shared))
                }
            };

        // Buffer lets slow subscribers lag by `event_buffer` events before seeing `Lagged`
        let (event_tx, _rx) = broadcast::channel(self.config.event_buffer);

        let queue_state = QueueState {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            queue_notify: Arc::new(Notify::new()),
            concurrent_limit: Arc::new(Semaphore::new(self.config.max_concurrent_downloads)),
            active_downloads: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_instance: Arc::new(AtomicU64::new(1)),
            processor_shutdown: CancellationToken::new(),
        };

        tracing::info!(
            max_concurrent = self.config.max_concurrent_downloads,
            partial_files = ?self.config.partial_files,
            "Download manager initialized"
        );

        let manager = DownloadManager {
            registry: Arc::new(TaskRegistry::new()),
            event_tx,
            config: Arc::new(self.config),
            settings,
            shared_settings,
            services: Services {
                resolver,
                lyrics: self.lyrics,
                filesystem: self.filesystem,
                transport: TransportAdapter::new(transport),
            },
            queue_state,
        };

        manager.start_queue_processor();

        Ok(manager)
    }
}

impl DownloadManager {
    /// Start building a manager from `config`
    pub fn builder(config: Config) -> DownloadManagerBuilder {
        DownloadManagerBuilder {
            config,
            resolver: None,
            lyrics: Arc::new(NoLyrics),
            filesystem: Arc::new(TokioFilesystem),
            transport: None,
            settings: None,
        }
    }

    /// Manager with default collaborators (HTTP transport, tokio filesystem, no lyrics)
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config, resolver: Arc<dyn UrlResolver>) -> Result<Self> {
        Self::builder(config).resolver(resolver).build()
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than `event_buffer` events receives
    /// `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use music_dl::{DownloadManager, Event};
    /// # async fn example(manager: DownloadManager) {
    /// let mut events = manager.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::Update(update) = event {
    ///             println!("{} -> {:?}", update.id, update.status);
    ///         }
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Task events as a `Stream`; lagged events are skipped
    pub fn event_stream(&self) -> impl futures::Stream<Item = Event> + Send + 'static {
        use futures::StreamExt;

        tokio_stream::wrappers::BroadcastStream::new(self.event_tx.subscribe()).filter_map(
            |item| async move {
                match item {
                    Ok(event) => Some(event),
                    Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event stream subscriber lagged");
                        None
                    }
                }
            },
        )
    }

    /// Snapshot of the task stored for `id`
    pub async fn get_task(&self, id: &TaskId) -> Option<DownloadTask> {
        self.registry.get(id).await
    }

    /// Snapshots of every stored task (active, paused, failed), oldest first
    pub async fn list_tasks(&self) -> Vec<DownloadTask> {
        self.registry.list().await
    }

    /// Snapshots of Pending and Downloading tasks
    pub async fn list_active(&self) -> Vec<DownloadTask> {
        self.registry.list_active().await
    }

    /// Queue occupancy counts
    pub async fn queue_stats(&self) -> QueueStats {
        QueueStats {
            pending: self.registry.count(Status::Pending).await,
            downloading: self.registry.count(Status::Downloading).await,
            paused: self.registry.count(Status::Paused).await,
            failed: self.registry.count(Status::Error).await,
            max_concurrent: self.config.max_concurrent_downloads,
        }
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped; downloads do not depend on listeners.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Allocate the next lifecycle instance number
    pub(crate) fn next_instance(&self) -> u64 {
        self.queue_state.next_instance.fetch_add(1, Ordering::SeqCst)
    }
}
