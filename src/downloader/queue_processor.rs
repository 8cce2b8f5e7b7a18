//! Queue processor: acquires worker slots and spawns download tasks.

use std::sync::atomic::Ordering;

use crate::types::StopIntent;

use super::DownloadManager;
use super::download_task::{DownloadTaskContext, run_download_task};

impl DownloadManager {
    /// Start the queue processor task
    ///
    /// Loops until shutdown:
    /// 1. Acquires a permit from the concurrency limiter (respects max_concurrent_downloads)
    /// 2. Waits for the next entry of the admission queue
    /// 3. Spawns a download task that owns the permit until its lifecycle ends
    ///
    /// The permit is taken before popping so entries stay in the queue, where they
    /// can still be promoted, paused or cancelled, until a slot is really free.
    pub(crate) fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let shutdown = self.queue_state.processor_shutdown.clone();

        tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    permit = manager.queue_state.concurrent_limit.clone().acquire_owned() => {
                        match permit {
                            Ok(p) => p,
                            Err(_) => break,
                        }
                    }
                };

                let next = loop {
                    if let Some(item) = manager.queue_state.queue.lock().await.pop_front() {
                        break Some(item);
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break None,
                        _ = manager.queue_state.queue_notify.notified() => {}
                    }
                };

                let Some(item) = next else {
                    break;
                };

                let Some(task) = manager.registry.get(&item.id).await else {
                    tracing::debug!(task_id = %item.id, "Queued task vanished before start");
                    continue;
                };
                if task.instance != item.instance {
                    tracing::debug!(task_id = %item.id, "Queued lifecycle was replaced before start");
                    continue;
                }

                // Popped while shutdown was draining the queue
                if !manager.queue_state.accepting_new.load(Ordering::SeqCst) {
                    manager.stop_queued(&task, StopIntent::Shutdown).await;
                    continue;
                }

                let Some(ctx) = DownloadTaskContext::from_task(&manager, &task) else {
                    continue;
                };

                // Register before spawning so shutdown sees the worker immediately
                manager
                    .queue_state
                    .active_downloads
                    .lock()
                    .await
                    .insert(ctx.handle(), ctx.cancel_handle.clone());

                tokio::spawn(async move {
                    let _permit = permit;
                    run_download_task(ctx).await;
                });
            }

            tracing::debug!("Queue processor stopped");
        })
    }
}
