//! Download task execution: one lifecycle from slot acquisition to a final state.
//!
//! Split into focused submodules:
//! - [`context`] - Per-lifecycle state and state-transition helpers
//! - [`orchestration`] - Top-level lifecycle: resolve, transfer, progress
//! - [`finalization`] - Completed / stopped / failed outcomes, partial files
//! - [`lyrics`] - Best-effort lyric sidecar after completion

mod context;
mod finalization;
mod lyrics;
mod orchestration;


pub(crate) use context::DownloadTaskContext;
pub(crate) use finalization::remove_partial_file;
pub(crate) use orchestration::run_download_task;
