//! Task registry: the working set of active and resumable tasks.
//!
//! Every read and write goes through one async mutex, so two writers can never
//! interleave on the same task. Callers always receive clones.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::types::{DownloadTask, Status, TaskId};

/// Keyed store of tasks
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, DownloadTask>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the task stored for `id`
    pub async fn get(&self, id: &TaskId) -> Option<DownloadTask> {
        self.tasks.lock().await.get(id).cloned()
    }

    /// Insert or replace the entry for `task.id`
    pub async fn put(&self, task: DownloadTask) {
        self.tasks.lock().await.insert(task.id.clone(), task);
    }

    /// Delete the entry for `id`, returning it
    pub async fn remove(&self, id: &TaskId) -> Option<DownloadTask> {
        self.tasks.lock().await.remove(id)
    }

    /// Delete the entry for `id` only if it still belongs to lifecycle `instance`
    pub async fn remove_instance(&self, id: &TaskId, instance: u64) -> Option<DownloadTask> {
        let mut tasks = self.tasks.lock().await;
        match tasks.get(id) {
            Some(task) if task.instance == instance => tasks.remove(id),
            _ => None,
        }
    }

    /// Tasks in Pending or Downloading status
    pub async fn list_active(&self) -> Vec<DownloadTask> {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|task| task.status.is_active())
            .cloned()
            .collect()
    }

    /// All stored tasks, oldest lifecycle first
    pub async fn list(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<_> = self.tasks.lock().await.values().cloned().collect();
        tasks.sort_by_key(|task| task.instance);
        tasks
    }

    /// Number of stored tasks in `status`
    pub async fn count(&self, status: Status) -> usize {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|task| task.status == status)
            .count()
    }

    /// Atomically insert `task` unless a live task already exists for its id
    ///
    /// Returns `Err(existing)` with a snapshot of the live task when the insert
    /// was refused. A stored Paused/Error/Completed record is replaced, and so is
    /// an active lifecycle that has already been told to stop.
    pub async fn insert_if_inactive(&self, task: DownloadTask) -> Result<(), DownloadTask> {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(&task.id)
            && existing.is_live()
        {
            return Err(existing.clone());
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Mutate the task for `id` if it belongs to lifecycle `instance`
    ///
    /// Returns a snapshot taken after the mutation, or `None` when the entry is
    /// gone or was replaced by a newer lifecycle.
    pub async fn update<F>(&self, id: &TaskId, instance: u64, f: F) -> Option<DownloadTask>
    where
        F: FnOnce(&mut DownloadTask),
    {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(id)?;
        if task.instance != instance {
            return None;
        }
        f(task);
        Some(task.clone())
    }
}
