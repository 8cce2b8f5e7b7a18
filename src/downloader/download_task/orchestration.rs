//! Download task orchestration: top-level lifecycle for a single task.

use crate::error::{ErrorInfo, ErrorKind, TransportError};
use crate::types::{Status, status_text};

use super::context::DownloadTaskContext;
use super::finalization::{finalize_completed, finalize_stopped};

/// Core download task -- runs one lifecycle while the caller holds a worker slot.
///
/// Phases:
/// 1. Honor a pause/cancel that arrived while the task was queued
/// 2. Transition to Downloading (progress 0)
/// 3. Resolve the playable URL
/// 4. Transfer into the staging file, reporting progress
/// 5. Finalize as Completed, Paused, removed, or Error
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    run_lifecycle(&ctx).await;
    ctx.remove_from_active().await;
}

async fn run_lifecycle(ctx: &DownloadTaskContext) {
    let id = &ctx.id;

    // Phase 1: stop requested between dequeue and start
    if ctx.cancel_handle.is_stopped() {
        finalize_stopped(ctx).await;
        return;
    }

    // Phase 2: Downloading
    let started = ctx
        .transition(|task| {
            task.status = Status::Downloading;
            task.progress = 0.0;
            task.status_text = status_text::downloading(0.0);
        })
        .await;
    if !started {
        tracing::debug!(task_id = %id, "Task record gone before start");
        return;
    }
    tracing::info!(task_id = %id, instance = ctx.instance, quality = %ctx.quality, "Download started");

    // Phase 3: resolve URL
    let token = ctx.cancel_handle.token().clone();
    let resolved = tokio::select! {
        biased;
        _ = token.cancelled() => {
            finalize_stopped(ctx).await;
            return;
        }
        resolved = ctx.manager.services.resolver.resolve(&ctx.item, ctx.quality) => resolved,
    };

    let url = match resolved {
        Ok(Some(url)) => url,
        Ok(None) => {
            let msg = format!("no playable URL for quality {}", ctx.quality);
            ctx.mark_failed(ErrorKind::ResolutionFailed, &msg).await;
            return;
        }
        Err(e) => {
            ctx.mark_failed(ErrorKind::ResolutionFailed, &e.to_string())
                .await;
            return;
        }
    };

    // Phase 4: transfer
    tracing::debug!(task_id = %id, url = %url, staging = ?ctx.staging, "Starting transfer");
    let mut transfer = ctx.manager.services.transport.start_with_parent(
        url,
        ctx.staging.clone(),
        &token,
    );

    while let Some(progress) = transfer.progress.recv().await {
        // Reports that race a stop request are dropped
        if ctx.cancel_handle.is_stopped() {
            continue;
        }
        ctx.report_progress(progress.percent()).await;
    }

    // Phase 5: finalize
    match transfer.completion.wait().await {
        Ok(bytes) => finalize_completed(ctx, bytes).await,
        Err(TransportError::Cancelled) => finalize_stopped(ctx).await,
        Err(e) => {
            if ctx.fail_with(ErrorInfo::from(&e)).await {
                ctx.apply_partial_file_policy().await;
            }
        }
    }
}
