//! Core types for music-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorInfo;

/// Stable identity of a music item, supplied by the caller
///
/// Used as the task key: at most one active task exists per `TaskId`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of a remote music item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicItem {
    /// Source identity (used as the task key)
    pub id: TaskId,
    /// Track title
    pub name: String,
    /// Primary artist
    pub singer: String,
    /// Album name, if known
    #[serde(default)]
    pub album: Option<String>,
    /// Display duration such as "03:45"
    #[serde(default)]
    pub interval: Option<String>,
}

impl MusicItem {
    /// Create an item with the fields that take part in file naming
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, singer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            singer: singer.into(),
            album: None,
            interval: None,
        }
    }
}

/// Audio quality tier
///
/// Ordered from lowest to highest. Wire codes match the bitrate/format codes
/// used by music sources (`128k`, `320k`, `flac`, `flac24bit`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Quality {
    /// 128 kbps MP3
    #[serde(rename = "128k")]
    Standard,
    /// 320 kbps MP3
    #[default]
    #[serde(rename = "320k")]
    High,
    /// 16-bit FLAC
    #[serde(rename = "flac")]
    Lossless,
    /// 24-bit FLAC
    #[serde(rename = "flac24bit")]
    HiResLossless,
}

impl Quality {
    /// All tiers, lowest first
    pub const ALL: [Quality; 4] = [
        Quality::Standard,
        Quality::High,
        Quality::Lossless,
        Quality::HiResLossless,
    ];

    /// Wire code of this tier
    pub fn code(&self) -> &'static str {
        match self {
            Quality::Standard => "128k",
            Quality::High => "320k",
            Quality::Lossless => "flac",
            Quality::HiResLossless => "flac24bit",
        }
    }

    /// Whether this tier is delivered as a lossless container
    pub fn is_lossless(&self) -> bool {
        matches!(self, Quality::Lossless | Quality::HiResLossless)
    }

    /// File extension used for this tier
    pub fn extension(&self) -> &'static str {
        if self.is_lossless() { "flac" } else { "mp3" }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Quality {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|q| q.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::Error::Config {
                message: format!("unknown quality '{}'", s),
                key: Some("default_quality".to_string()),
            })
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the admission queue for a worker slot
    Pending,
    /// Transfer in progress
    Downloading,
    /// Stopped by the caller, resumable
    Paused,
    /// Failed; see `error_info`
    Error,
    /// File is on disk
    Completed,
    /// Aborted by the caller
    Cancelled,
}

impl Status {
    /// Pending or Downloading
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Pending | Status::Downloading)
    }

    /// Paused or Error, i.e. can be resubmitted with `resume_download`
    pub fn is_resumable(&self) -> bool {
        matches!(self, Status::Paused | Status::Error)
    }
}

/// Handle returned by request operations
///
/// Two requests that were deduplicated onto the same lifecycle return equal handles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Task key
    pub id: TaskId,
    /// Lifecycle instance number
    pub instance: u64,
}

/// Cancellation capability of a running task
///
/// Records whether the stop was requested as a pause or a cancel so the worker
/// can pick the right follow-up state once the transfer unwinds.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: tokio_util::sync::CancellationToken,
    intent: std::sync::Arc<std::sync::Mutex<Option<StopIntent>>>,
}

/// Why a task was stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopIntent {
    /// Keep the record as Paused
    Pause,
    /// Drop the record
    Cancel,
    /// Manager shutdown; treated like pause
    Shutdown,
}

impl CancelHandle {
    /// Create a fresh, untriggered handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop with the given intent
    ///
    /// The first intent wins except that `Cancel` overrides an earlier `Pause`.
    pub fn stop(&self, intent: StopIntent) {
        if let Ok(mut current) = self.intent.lock() {
            match *current {
                None => *current = Some(intent),
                Some(StopIntent::Pause) | Some(StopIntent::Shutdown)
                    if intent == StopIntent::Cancel =>
                {
                    *current = Some(intent)
                }
                Some(_) => {}
            }
        }
        self.token.cancel();
    }

    /// Intent of the stop request, if any was made
    pub fn intent(&self) -> Option<StopIntent> {
        self.intent.lock().ok().and_then(|guard| *guard)
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Underlying token, for wiring into transfers
    pub fn token(&self) -> &tokio_util::sync::CancellationToken {
        &self.token
    }
}

/// One download lifecycle for an item/quality pair
///
/// Values handed out by the manager are snapshots; mutating them has no effect
/// on the manager's state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Task key (same as `item.id`)
    pub id: TaskId,
    /// Item being downloaded
    pub item: MusicItem,
    /// Requested quality
    pub quality: Quality,
    /// Current status
    pub status: Status,
    /// Progress percentage in [0, 100]
    pub progress: f64,
    /// Locale-independent status summary
    pub status_text: String,
    /// Destination path, set once computed
    pub file_path: Option<PathBuf>,
    /// Failure cause, only present when `status == Error`
    pub error_info: Option<ErrorInfo>,
    /// Stop capability, present while the lifecycle may still transfer
    #[serde(skip)]
    pub cancel_handle: Option<CancelHandle>,
    /// Lifecycle instance number
    pub instance: u64,
    /// When this lifecycle was created
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    /// Create a Pending task
    pub fn pending(item: MusicItem, quality: Quality, instance: u64, file_path: PathBuf) -> Self {
        Self {
            id: item.id.clone(),
            item,
            quality,
            status: Status::Pending,
            progress: 0.0,
            status_text: status_text::PENDING.to_string(),
            file_path: Some(file_path),
            error_info: None,
            cancel_handle: Some(CancelHandle::new()),
            instance,
            created_at: Utc::now(),
        }
    }

    /// Pending or Downloading with no pause/cancel requested
    ///
    /// A stopped lifecycle keeps its active status until its worker unwinds, but it
    /// no longer owns the id: a new request for the item starts a fresh lifecycle.
    pub fn is_live(&self) -> bool {
        self.status.is_active()
            && !self
                .cancel_handle
                .as_ref()
                .is_some_and(|handle| handle.is_stopped())
    }

    /// Handle identifying this lifecycle
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            id: self.id.clone(),
            instance: self.instance,
        }
    }

    /// Partial-update record describing the current state
    pub fn to_update(&self) -> DownloadUpdate {
        DownloadUpdate {
            id: self.id.clone(),
            status: self.status,
            progress: Some(self.progress),
            status_text: Some(self.status_text.clone()),
            file_path: self.file_path.clone(),
            error_info: self.error_info.clone(),
        }
    }
}

/// Status summary strings
pub mod status_text {
    /// Waiting for a slot
    pub const PENDING: &str = "Pending";
    /// Stopped by the caller
    pub const PAUSED: &str = "Paused";
    /// Aborted by the caller
    pub const CANCELLED: &str = "Cancelled";
    /// Transfer finished
    pub const COMPLETED: &str = "Completed";
    /// File was already on disk
    pub const ALREADY_DOWNLOADED: &str = "Already downloaded";

    /// Progress summary while downloading
    pub fn downloading(progress: f64) -> String {
        format!("Downloading {:.2}%", progress)
    }

    /// Failure summary
    pub fn failed(message: &str) -> String {
        format!("Failed: {}", message)
    }
}

/// Partial-update record; subscribers merge by `id`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadUpdate {
    /// Task key
    pub id: TaskId,
    /// New status
    pub status: Status,
    /// Progress percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Status summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Destination path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Failure cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

/// Event emitted by the download manager
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task changed state or made progress
    Update(DownloadUpdate),

    /// A task record was dropped after a caller-initiated cancel
    Removed {
        /// Task key
        id: TaskId,
    },

    /// Lyric sidecar written next to the music file
    LyricSaved {
        /// Task key
        id: TaskId,
        /// Sidecar path
        path: PathBuf,
    },

    /// Lyric sidecar could not be fetched or written (music file unaffected)
    LyricFailed {
        /// Task key
        id: TaskId,
        /// Cause
        error: String,
    },

    /// Manager is shutting down
    Shutdown,
}

impl Event {
    /// Task key this event refers to, if any
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::Update(update) => Some(&update.id),
            Event::Removed { id } | Event::LyricSaved { id, .. } | Event::LyricFailed { id, .. } => {
                Some(id)
            }
            Event::Shutdown => None,
        }
    }
}

/// Snapshot of queue occupancy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for a slot
    pub pending: usize,
    /// Tasks currently transferring
    pub downloading: usize,
    /// Paused tasks kept for resumption
    pub paused: usize,
    /// Failed tasks kept for resumption
    pub failed: usize,
    /// Configured concurrency limit
    pub max_concurrent: usize,
}
