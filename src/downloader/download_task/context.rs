//! Download task context: per-lifecycle state and transition helpers.

use std::path::PathBuf;

use crate::error::{ErrorInfo, ErrorKind};
use crate::filename;
use crate::types::{
    CancelHandle, DownloadTask, Event, MusicItem, Quality, Status, TaskHandle, TaskId,
    status_text,
};

use super::super::DownloadManager;

/// Shared context for a single lifecycle, reducing parameter passing between helpers
pub(crate) struct DownloadTaskContext {
    pub(crate) id: TaskId,
    pub(crate) instance: u64,
    pub(crate) item: MusicItem,
    pub(crate) quality: Quality,
    /// Final location of the file
    pub(crate) destination: PathBuf,
    /// Where the transfer writes until it succeeds
    pub(crate) staging: PathBuf,
    pub(crate) cancel_handle: CancelHandle,
    pub(crate) manager: DownloadManager,
}

impl DownloadTaskContext {
    /// Build a context for a Pending task taken off the admission queue
    ///
    /// Returns `None` for records that cannot run (no destination or stop handle).
    pub(crate) fn from_task(manager: &DownloadManager, task: &DownloadTask) -> Option<Self> {
        let destination = task.file_path.clone()?;
        let cancel_handle = task.cancel_handle.clone()?;
        Some(Self {
            id: task.id.clone(),
            instance: task.instance,
            item: task.item.clone(),
            quality: task.quality,
            staging: filename::staging_path(&destination),
            destination,
            cancel_handle,
            manager: manager.clone(),
        })
    }

    /// Apply `f` to this lifecycle's record and emit the resulting state
    ///
    /// Returns false when the record is gone or belongs to a newer lifecycle; in that
    /// case nothing is emitted.
    pub(super) async fn transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut DownloadTask),
    {
        match self
            .manager
            .registry
            .update(&self.id, self.instance, f)
            .await
        {
            Some(task) => {
                self.manager.emit_event(Event::Update(task.to_update()));
                true
            }
            None => false,
        }
    }

    /// Record the transfer's progress; never moves backwards
    pub(super) async fn report_progress(&self, percent: f64) -> bool {
        let mut advanced = false;
        let updated = self
            .manager
            .registry
            .update(&self.id, self.instance, |task| {
                if task.status == Status::Downloading && percent > task.progress {
                    task.progress = percent;
                    task.status_text = status_text::downloading(percent);
                    advanced = true;
                }
            })
            .await;

        match updated {
            Some(task) if advanced => {
                self.manager.emit_event(Event::Update(task.to_update()));
                true
            }
            _ => false,
        }
    }

    /// Mark the lifecycle as failed with `kind` and emit the failure
    pub(super) async fn mark_failed(&self, kind: ErrorKind, message: &str) -> bool {
        self.fail_with(ErrorInfo::new(kind, message)).await
    }

    /// Mark the lifecycle as failed with `info` and emit the failure
    ///
    /// Returns false when a newer lifecycle owns the id; its record is left alone.
    pub(super) async fn fail_with(&self, info: ErrorInfo) -> bool {
        tracing::warn!(
            task_id = %self.id,
            instance = self.instance,
            kind = ?info.kind,
            error = %info.message,
            "Download failed"
        );
        self.transition(|task| {
            task.status = Status::Error;
            task.status_text = status_text::failed(&info.message);
            task.error_info = Some(info);
            task.cancel_handle = None;
        })
        .await
    }

    /// Whether the registry record for the id still belongs to this lifecycle
    pub(super) async fn owns_record(&self) -> bool {
        self.manager
            .registry
            .get(&self.id)
            .await
            .is_some_and(|task| task.instance == self.instance)
    }

    /// Remove this download from the active downloads map
    pub(super) async fn remove_from_active(&self) {
        let mut active = self.manager.queue_state.active_downloads.lock().await;
        active.remove(&self.handle());
    }

    /// Handle identifying this lifecycle
    pub(crate) fn handle(&self) -> TaskHandle {
        TaskHandle {
            id: self.id.clone(),
            instance: self.instance,
        }
    }
}
