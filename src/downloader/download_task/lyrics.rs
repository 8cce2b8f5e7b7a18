//! Lyric sidecar: fetched and written after the music file is complete.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::filename;
use crate::providers::{Filesystem, LyricProvider};
use crate::types::{Event, MusicItem};

use super::context::DownloadTaskContext;

/// Spawn the lyric follow-up as an independent background task.
///
/// Outcomes are reported through logging and `LyricSaved` / `LyricFailed` events.
pub(super) fn spawn_lyric_sidecar(ctx: &DownloadTaskContext) {
    let manager = ctx.manager.clone();
    let id = ctx.id.clone();
    let item = ctx.item.clone();
    let music_path = ctx.destination.clone();
    let extension = manager.settings.lyric_extension();

    tokio::spawn(async move {
        let result = save_lyric(
            manager.services.lyrics.as_ref(),
            manager.services.filesystem.as_ref(),
            &item,
            &music_path,
            &extension,
        )
        .await;

        match result {
            Ok(Some(path)) => {
                tracing::info!(task_id = %id, path = ?path, "Lyric saved");
                manager.emit_event(Event::LyricSaved { id, path });
            }
            Ok(None) => {
                tracing::debug!(task_id = %id, "No lyric available");
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Lyric download failed");
                manager.emit_event(Event::LyricFailed {
                    id,
                    error: e.to_string(),
                });
            }
        }
    });
}

/// Fetch lyric text for `item` and write it next to `music_path`
///
/// Returns the sidecar path, or `None` when the provider has no lyric.
pub(crate) async fn save_lyric(
    lyrics: &dyn LyricProvider,
    fs: &dyn Filesystem,
    item: &MusicItem,
    music_path: &Path,
    extension: &str,
) -> Result<Option<PathBuf>> {
    let Some(text) = lyrics.fetch_lyric(item).await? else {
        return Ok(None);
    };
    if text.trim().is_empty() {
        return Ok(None);
    }

    let path = filename::lyric_path(music_path, extension);
    fs.write_file(&path, &text).await?;
    Ok(Some(path))
}
