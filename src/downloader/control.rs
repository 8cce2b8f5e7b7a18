//! Task lifecycle control: pause, resume, cancel.

use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadTask, Event, Status, StopIntent, TaskHandle, TaskId, status_text};

use super::DownloadManager;
use super::download_task::remove_partial_file;
use crate::filename;

impl DownloadManager {
    /// Pause a task
    ///
    /// A Downloading task is stopped cooperatively at its next chunk boundary and
    /// ends up Paused with its last progress value. A Pending task still waiting
    /// in the admission queue is taken out of the queue and marked Paused directly.
    /// Any other state (or an unknown id) is a no-op.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use music_dl::{DownloadManager, TaskId};
    /// # async fn example(manager: DownloadManager) {
    /// manager.pause_download(&TaskId::from("A")).await;
    /// # }
    /// ```
    pub async fn pause_download(&self, id: &TaskId) {
        self.stop(id, StopIntent::Pause).await;
    }

    /// Cancel a task and drop its record
    ///
    /// Running and queued tasks are stopped and removed; Paused and Error records
    /// are removed. Subscribers receive a `Cancelled` update followed by `Removed`.
    /// Calling this twice, after completion, or for an unknown id is a no-op.
    pub async fn cancel_download(&self, id: &TaskId) {
        self.stop(id, StopIntent::Cancel).await;
    }

    /// Resubmit a Paused or failed task as a new lifecycle
    ///
    /// Equivalent to [`request_download`](Self::request_download) with the task's item
    /// and quality. The transfer restarts from zero; earlier progress is not reused.
    /// If a lifecycle for the id is already running its handle is returned. A
    /// lifecycle that was just paused or cancelled but has not unwound yet does not
    /// count: the resume starts a new one.
    pub async fn resume_download(&self, task: &DownloadTask) -> Result<TaskHandle> {
        if let Some(current) = self.registry.get(&task.id).await
            && current.is_live()
        {
            return Ok(current.handle());
        }

        tracing::info!(task_id = %task.id, previous_instance = task.instance, "Resuming download");
        self.request_download(task.item.clone(), Some(task.quality))
            .await
    }

    /// Resubmit the stored Paused or failed task for `id`
    ///
    /// # Errors
    ///
    /// - [`DownloadError::NotFound`] if the registry has no record for `id`
    /// - [`DownloadError::InvalidState`] if the record is neither active nor resumable
    ///
    /// A record still Pending/Downloading after a pause request is resumed like a
    /// Paused one.
    pub async fn resume_by_id(&self, id: &TaskId) -> Result<TaskHandle> {
        let task = self.registry.get(id).await.ok_or_else(|| {
            Error::Download(DownloadError::NotFound { id: id.to_string() })
        })?;

        if task.is_live() {
            return Ok(task.handle());
        }
        if !task.status.is_active() && !task.status.is_resumable() {
            return Err(Error::Download(DownloadError::InvalidState {
                id: id.to_string(),
                operation: "resume".to_string(),
                current_state: format!("{:?}", task.status),
            }));
        }

        self.resume_download(&task).await
    }

    /// Shared pause/cancel path
    pub(crate) async fn stop(&self, id: &TaskId, intent: StopIntent) {
        let Some(task) = self.registry.get(id).await else {
            return;
        };

        match task.status {
            Status::Pending => {
                if self.remove_from_queue(id, task.instance).await {
                    // Never started: no worker exists, so the transition happens here
                    self.stop_queued(&task, intent).await;
                } else if let Some(handle) = &task.cancel_handle {
                    // Already handed to a worker; it applies the intent on start
                    handle.stop(intent);
                }
            }
            Status::Downloading => {
                if let Some(handle) = &task.cancel_handle {
                    tracing::debug!(task_id = %id, ?intent, "Signaling stop to running download");
                    handle.stop(intent);
                }
            }
            Status::Paused | Status::Error if intent == StopIntent::Cancel => {
                self.drop_record(&task).await;
            }
            Status::Paused | Status::Error | Status::Completed | Status::Cancelled => {}
        }
    }

    /// Apply a stop to a task that was removed from the queue before starting
    pub(crate) async fn stop_queued(&self, task: &DownloadTask, intent: StopIntent) {
        match intent {
            StopIntent::Cancel => self.drop_record(task).await,
            StopIntent::Pause | StopIntent::Shutdown => {
                let paused = self
                    .registry
                    .update(&task.id, task.instance, |t| {
                        t.status = Status::Paused;
                        t.status_text = status_text::PAUSED.to_string();
                        t.cancel_handle = None;
                    })
                    .await;
                if let Some(paused) = paused {
                    tracing::info!(task_id = %task.id, "Queued download paused");
                    self.emit_event(Event::Update(paused.to_update()));
                }
            }
        }
    }

    /// Remove a record that has no running worker and announce it
    async fn drop_record(&self, task: &DownloadTask) {
        let Some(mut removed) = self.registry.remove_instance(&task.id, task.instance).await
        else {
            return;
        };

        removed.status = Status::Cancelled;
        removed.status_text = status_text::CANCELLED.to_string();
        removed.cancel_handle = None;
        self.emit_event(Event::Update(removed.to_update()));
        self.emit_event(Event::Removed {
            id: removed.id.clone(),
        });
        tracing::info!(task_id = %removed.id, "Download record removed");

        if self.config.partial_files == crate::config::PartialFileAction::Delete
            && let Some(path) = &removed.file_path
        {
            remove_partial_file(
                self.services.filesystem.as_ref(),
                &filename::staging_path(path),
            )
            .await;
        }
    }
}
