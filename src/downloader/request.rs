//! Download requests: dedup, destination, existing-file short-circuit, admission.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::error::{Error, ErrorInfo, ErrorKind, Result};
use crate::filename;
use crate::types::{DownloadTask, Event, MusicItem, Quality, Status, TaskHandle, status_text};

use super::{DownloadManager, QueuedTask};

impl DownloadManager {
    /// Request a download of `item`
    ///
    /// If a Pending or Downloading task for `item.id` already exists its handle is
    /// returned and nothing else happens. Otherwise the destination is computed from
    /// the current settings; when a file is already there the task completes
    /// immediately without any network access, else a Pending task is queued.
    ///
    /// Filesystem failures while preparing the destination do not fail the call:
    /// the task is recorded in `Error` status with a `FilesystemError` cause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use music_dl::{DownloadManager, MusicItem, Quality};
    /// # async fn example(manager: DownloadManager) -> music_dl::Result<()> {
    /// let item = MusicItem::new("A", "Song", "Artist");
    /// let handle = manager.request_download(item, Some(Quality::Lossless)).await?;
    /// println!("queued {} (lifecycle {})", handle.id, handle.instance);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request_download(
        &self,
        item: MusicItem,
        quality: Option<Quality>,
    ) -> Result<TaskHandle> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        if let Some(existing) = self.registry.get(&item.id).await
            && existing.is_live()
        {
            tracing::debug!(task_id = %item.id, "Task already active, returning existing handle");
            return Ok(existing.handle());
        }

        let quality = quality.unwrap_or_else(|| self.settings.default_quality());
        let save_dir = self.settings.save_dir();
        let file_name = filename::compute_file_name_with_template(
            &item,
            quality,
            &self.settings.file_name_template(),
        );
        let destination = save_dir.join(file_name);
        let instance = self.next_instance();

        let already_there = match self.prepare_destination(&save_dir, &destination).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!(task_id = %item.id, error = %e, "Failed to prepare destination");
                return self
                    .record_failed_request(item, quality, instance, destination, &e)
                    .await;
            }
        };

        if already_there {
            return self
                .complete_existing(item, quality, instance, destination)
                .await;
        }

        let task = DownloadTask::pending(item, quality, instance, destination);
        let handle = task.handle();
        if let Err(existing) = self.registry.insert_if_inactive(task.clone()).await {
            return Ok(existing.handle());
        }

        tracing::info!(
            task_id = %handle.id,
            instance,
            quality = %quality,
            "Download queued"
        );
        self.emit_event(Event::Update(task.to_update()));
        self.enqueue(QueuedTask {
            id: handle.id.clone(),
            instance,
        })
        .await;

        Ok(handle)
    }

    /// Request downloads for several items
    ///
    /// Each item goes through [`request_download`](Self::request_download), so the
    /// dedup rule and the concurrency limit apply exactly as for single requests.
    /// Results are returned in input order.
    pub async fn request_batch_download(
        &self,
        items: Vec<MusicItem>,
        quality: Option<Quality>,
    ) -> Vec<Result<TaskHandle>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.request_download(item, quality).await);
        }
        results
    }

    /// Create the save directory if needed and report whether `destination` exists
    async fn prepare_destination(&self, save_dir: &Path, destination: &Path) -> Result<bool> {
        let fs = &self.services.filesystem;
        if !fs.exists(save_dir).await? {
            fs.create_dir_all(save_dir).await?;
        }
        fs.exists(destination).await
    }

    /// Short-circuit: the file is already on disk
    async fn complete_existing(
        &self,
        item: MusicItem,
        quality: Quality,
        instance: u64,
        destination: PathBuf,
    ) -> Result<TaskHandle> {
        let mut task = DownloadTask::pending(item, quality, instance, destination);
        task.status = Status::Completed;
        task.progress = 100.0;
        task.status_text = status_text::ALREADY_DOWNLOADED.to_string();
        task.cancel_handle = None;

        let handle = task.handle();
        if let Err(existing) = self.registry.insert_if_inactive(task.clone()).await {
            return Ok(existing.handle());
        }

        tracing::info!(task_id = %handle.id, path = ?task.file_path, "File already exists, skipping download");
        self.emit_event(Event::Update(task.to_update()));

        // Completed tasks leave the working set
        self.registry.remove_instance(&handle.id, instance).await;

        Ok(handle)
    }

    /// Record a request that failed before it could be queued
    async fn record_failed_request(
        &self,
        item: MusicItem,
        quality: Quality,
        instance: u64,
        destination: PathBuf,
        error: &Error,
    ) -> Result<TaskHandle> {
        let message = error.to_string();
        let mut task = DownloadTask::pending(item, quality, instance, destination);
        task.status = Status::Error;
        task.status_text = status_text::failed(&message);
        task.error_info = Some(ErrorInfo::new(ErrorKind::FilesystemError, message));
        task.cancel_handle = None;

        let handle = task.handle();
        if let Err(existing) = self.registry.insert_if_inactive(task.clone()).await {
            return Ok(existing.handle());
        }
        self.emit_event(Event::Update(task.to_update()));
        Ok(handle)
    }
}
