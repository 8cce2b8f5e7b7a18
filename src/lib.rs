//! # music-dl
//!
//! Embeddable download task manager for music files and their lyric sidecars.
//!
//! ## Design Philosophy
//!
//! music-dl is designed to be:
//! - **Library-first** - No UI, purely a Rust crate for embedding in an app backend
//! - **Pluggable** - URL resolution, lyrics, filesystem and transfer are traits
//! - **One task per item** - Requests for an item already in flight return the same handle
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use music_dl::{Config, DownloadManager, MusicItem, Quality, UrlResolver};
//!
//! struct MyResolver;
//!
//! #[async_trait]
//! impl UrlResolver for MyResolver {
//!     async fn resolve(
//!         &self,
//!         item: &MusicItem,
//!         quality: Quality,
//!     ) -> music_dl::Result<Option<String>> {
//!         Ok(Some(format!("https://cdn.example.com/{}/{}", item.id, quality.code())))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default(), Arc::new(MyResolver))?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let item = MusicItem::new("A", "Song", "Artist");
//!     manager.request_download(item, Some(Quality::Lossless)).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration and runtime settings
pub mod config;
/// Download manager (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Destination file naming
pub mod filename;
/// Collaborator traits: URL resolution, lyrics, filesystem
pub mod providers;
/// Keyed task storage
pub mod registry;
/// Transfer primitive and adapter
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, PartialFileAction, Settings, SettingsStore, SharedSettings, TransportConfig};
pub use downloader::{DownloadManager, DownloadManagerBuilder};
pub use error::{DownloadError, Error, ErrorInfo, ErrorKind, Result, TransportError};
pub use providers::{Filesystem, LyricProvider, NoLyrics, TokioFilesystem, UrlResolver};
pub use transport::{
    HttpTransport, Transfer, TransferCancel, TransferProgress, TransportAdapter, TransportPrimitive,
};
pub use types::{
    DownloadTask, DownloadUpdate, Event, MusicItem, Quality, QueueStats, Status, TaskHandle, TaskId,
};

/// Run the manager until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever can be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// use music_dl::{Config, DownloadManager, UrlResolver, run_with_shutdown};
///
/// # async fn example(resolver: Arc<dyn UrlResolver>) -> Result<(), Box<dyn std::error::Error>> {
/// let manager = DownloadManager::new(Config::default(), resolver)?;
/// run_with_shutdown(manager).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(_), Err(e)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
