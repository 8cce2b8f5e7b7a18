//! Download finalization: Completed, stopped (Paused / removed) and partial files.

use std::path::Path;

use crate::config::PartialFileAction;
use crate::error::ErrorKind;
use crate::providers::Filesystem;
use crate::types::{Event, Status, StopIntent, status_text};

use super::context::DownloadTaskContext;
use super::lyrics::spawn_lyric_sidecar;

/// Move the staging file into place and mark the lifecycle Completed.
///
/// The terminal event is emitted before any lyric work starts; the lyric sidecar
/// runs detached and can never change the music task's status.
pub(super) async fn finalize_completed(ctx: &DownloadTaskContext, bytes: u64) {
    // A superseded lifecycle shares the staging path with its successor
    if !ctx.owns_record().await {
        tracing::debug!(
            task_id = %ctx.id,
            instance = ctx.instance,
            "Transfer finished after the lifecycle was replaced, discarding"
        );
        return;
    }

    let fs = &ctx.manager.services.filesystem;
    if let Err(e) = fs.rename(&ctx.staging, &ctx.destination).await {
        if ctx
            .mark_failed(ErrorKind::FilesystemError, &e.to_string())
            .await
        {
            ctx.apply_partial_file_policy().await;
        }
        return;
    }

    let completed = ctx
        .transition(|task| {
            task.status = Status::Completed;
            task.progress = 100.0;
            task.status_text = status_text::COMPLETED.to_string();
            task.file_path = Some(ctx.destination.clone());
            task.error_info = None;
            task.cancel_handle = None;
        })
        .await;

    if !completed {
        return;
    }

    tracing::info!(
        task_id = %ctx.id,
        instance = ctx.instance,
        bytes,
        path = ?ctx.destination,
        "Download complete"
    );

    // Completed tasks leave the working set
    ctx.manager
        .registry
        .remove_instance(&ctx.id, ctx.instance)
        .await;

    if ctx.manager.settings.download_lyrics() {
        spawn_lyric_sidecar(ctx);
    }
}

/// Finish a lifecycle whose transfer was stopped by the caller.
///
/// Cancel drops the record and emits `Cancelled` followed by `Removed`. Pause and
/// shutdown keep the record as Paused with its last progress value. A lifecycle that
/// was already replaced by a new request emits nothing and leaves the staging file
/// to its successor.
pub(super) async fn finalize_stopped(ctx: &DownloadTaskContext) {
    match ctx.cancel_handle.intent() {
        Some(StopIntent::Cancel) => {
            let removed = ctx
                .manager
                .registry
                .remove_instance(&ctx.id, ctx.instance)
                .await;
            if let Some(mut task) = removed {
                task.status = Status::Cancelled;
                task.status_text = status_text::CANCELLED.to_string();
                task.cancel_handle = None;
                ctx.manager.emit_event(Event::Update(task.to_update()));
                ctx.manager.emit_event(Event::Removed {
                    id: ctx.id.clone(),
                });
                tracing::info!(task_id = %ctx.id, instance = ctx.instance, "Download cancelled");
                ctx.apply_partial_file_policy().await;
            }
        }
        Some(StopIntent::Pause) | Some(StopIntent::Shutdown) | None => {
            let paused = ctx
                .transition(|task| {
                    task.status = Status::Paused;
                    task.status_text = status_text::PAUSED.to_string();
                    task.cancel_handle = None;
                })
                .await;
            if paused {
                tracing::info!(task_id = %ctx.id, instance = ctx.instance, "Download paused");
            }
        }
    }
}

impl DownloadTaskContext {
    /// Delete the staging file if the configuration asks for it
    pub(super) async fn apply_partial_file_policy(&self) {
        if self.manager.config.partial_files == PartialFileAction::Delete {
            remove_partial_file(self.manager.services.filesystem.as_ref(), &self.staging).await;
        }
    }
}

/// Best-effort removal of a partial file; failures are logged only
pub(crate) async fn remove_partial_file(fs: &dyn Filesystem, staging: &Path) {
    match fs.remove_file(staging).await {
        Ok(()) => tracing::debug!(path = ?staging, "Removed partial file"),
        Err(e) => tracing::warn!(path = ?staging, error = %e, "Failed to remove partial file"),
    }
}
