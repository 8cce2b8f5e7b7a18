//! FIFO admission queue management.

use crate::types::TaskId;

use super::{DownloadManager, QueuedTask};

impl DownloadManager {
    /// Append a task to the admission queue and wake the queue processor
    pub(crate) async fn enqueue(&self, queued: QueuedTask) {
        {
            let mut queue = self.queue_state.queue.lock().await;
            queue.push_back(queued);
            tracing::debug!(queue_len = queue.len(), "Task added to admission queue");
        }
        self.queue_state.queue_notify.notify_one();
    }

    /// Remove a task from the admission queue without starting it
    ///
    /// Returns true if the entry for this lifecycle was still queued. False means
    /// the queue processor already handed it to a worker (or it never was queued).
    pub(crate) async fn remove_from_queue(&self, id: &TaskId, instance: u64) -> bool {
        let mut queue = self.queue_state.queue.lock().await;
        let original_len = queue.len();
        queue.retain(|item| !(item.id == *id && item.instance == instance));
        queue.len() < original_len
    }

    /// Take every queued entry (used during shutdown)
    pub(crate) async fn drain_queue(&self) -> Vec<QueuedTask> {
        let mut queue = self.queue_state.queue.lock().await;
        queue.drain(..).collect()
    }

    /// Move a queued task to the front of the admission queue
    ///
    /// Returns false if the task is not waiting in the queue (already running,
    /// finished, or unknown).
    pub async fn promote(&self, id: &TaskId) -> bool {
        let mut queue = self.queue_state.queue.lock().await;
        let Some(position) = queue.iter().position(|item| item.id == *id) else {
            return false;
        };
        if let Some(item) = queue.remove(position) {
            queue.push_front(item);
            tracing::debug!(task_id = %id, from = position, "Task promoted to front of queue");
            true
        } else {
            false
        }
    }

    /// Ids waiting for a slot, in admission order
    pub async fn queued_ids(&self) -> Vec<TaskId> {
        let queue = self.queue_state.queue.lock().await;
        queue.iter().map(|item| item.id.clone()).collect()
    }
}
