//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::{Event, StopIntent};

use super::DownloadManager;

/// How long shutdown waits for workers to unwind
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between checks of the active worker count
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl DownloadManager {
    /// Gracefully shut down the manager
    ///
    /// 1. Stops accepting new requests (`Error::ShuttingDown`)
    /// 2. Marks queued tasks Paused and pauses running transfers
    /// 3. Waits for running workers to unwind (30 second timeout)
    /// 4. Stops the queue processor and emits `Event::Shutdown`
    ///
    /// Paused records stay in the registry and can be resumed by the caller
    /// (for instance after persisting them elsewhere).
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        for queued in self.drain_queue().await {
            if let Some(task) = self.registry.get(&queued.id).await
                && task.instance == queued.instance
            {
                self.stop_queued(&task, StopIntent::Shutdown).await;
            }
        }

        self.pause_graceful_all().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_downloads()).await {
            Ok(()) => tracing::info!("All active downloads stopped"),
            Err(_) => {
                tracing::warn!("Timeout waiting for downloads to stop, proceeding with shutdown")
            }
        }

        self.queue_state.processor_shutdown.cancel();
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Signal every running worker to stop and keep its record as Paused
    pub(crate) async fn pause_graceful_all(&self) {
        let active = self.queue_state.active_downloads.lock().await;
        tracing::debug!(
            active_count = active.len(),
            "Gracefully pausing all active downloads"
        );

        for (handle, cancel) in active.iter() {
            tracing::debug!(task_id = %handle.id, "Signaling graceful pause");
            cancel.stop(StopIntent::Shutdown);
        }
    }

    /// Wait until no worker holds a slot
    async fn wait_for_active_downloads(&self) {
        loop {
            let active_count = self.queue_state.active_downloads.lock().await.len();
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for active downloads to stop");
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
    }
}
