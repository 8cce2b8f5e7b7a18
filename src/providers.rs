//! External collaborators: URL resolution, lyrics, and filesystem access.
//!
//! The manager only talks to these traits. [`TokioFilesystem`] is the production
//! filesystem; resolvers and lyric providers come from the embedding application.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{MusicItem, Quality};

/// Resolves a playable URL for an item at a quality tier
///
/// `Ok(None)` and `Err(_)` are treated alike: the task fails with
/// `ResolutionFailed`. No fallback to other tiers is attempted.
#[async_trait::async_trait]
pub trait UrlResolver: Send + Sync {
    /// Playable URL, if the source has one
    async fn resolve(&self, item: &MusicItem, quality: Quality) -> Result<Option<String>>;
}

/// Fetches lyric text for an item
#[async_trait::async_trait]
pub trait LyricProvider: Send + Sync {
    /// Lyric text (typically LRC), if the source has any
    async fn fetch_lyric(&self, item: &MusicItem) -> Result<Option<String>>;
}

/// Lyric provider that never has lyrics
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLyrics;

#[async_trait::async_trait]
impl LyricProvider for NoLyrics {
    async fn fetch_lyric(&self, _item: &MusicItem) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Filesystem primitives used around a transfer
#[async_trait::async_trait]
pub trait Filesystem: Send + Sync {
    /// Whether something exists at `path`
    async fn exists(&self, path: &Path) -> Result<bool>;
    /// Create `path` and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Write UTF-8 text, replacing any existing file
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    /// Move `from` to `to`, replacing `to`
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// Delete a file; a missing file is not an error
    async fn remove_file(&self, path: &Path) -> Result<()>;
}

/// [`Filesystem`] backed by `tokio::fs`
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioFilesystem;

#[async_trait::async_trait]
impl Filesystem for TokioFilesystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| Error::filesystem(path, e))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::filesystem(path, e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::write(path, content.as_bytes())
            .await
            .map_err(|e| Error::filesystem(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| Error::filesystem(to, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::filesystem(path, e)),
        }
    }
}
