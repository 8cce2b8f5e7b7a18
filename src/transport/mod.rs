//! Transport adapter: uniform (start, progress stream, cancel) contract over a
//! pluggable byte-transfer primitive.
//!
//! - [`TransportPrimitive`] - the low-level transfer (HTTP by default, see [`http`])
//! - [`TransportAdapter`] - runs a primitive in its own task and exposes a [`Transfer`]

pub mod http;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

pub use http::HttpTransport;

/// Progress callback handed to a primitive: `(bytes_written, total_bytes)`
pub type ProgressCallback<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Low-level chunked transfer of a URL to a local path
///
/// Implementations should check `cancel` at each chunk boundary and return
/// [`TransportError::Cancelled`] when it fires. They must not retry.
#[async_trait::async_trait]
pub trait TransportPrimitive: Send + Sync {
    /// Transfer `url` into `destination`, returning the number of bytes written
    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        on_progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError>;
}

/// One progress report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes written so far
    pub bytes_written: u64,
    /// Expected total, if the source announced one
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Percentage in [0, 100]; 0 while the total is unknown
    pub fn percent(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => {
                (self.bytes_written as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }
}

/// Cancel capability of a running transfer
///
/// Idempotent. Once the transfer has finished on its own, cancelling is a no-op.
#[derive(Clone, Debug)]
pub struct TransferCancel {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl TransferCancel {
    /// Signal the transfer to stop at its next chunk boundary
    pub fn cancel(&self) {
        if !self.finished.load(Ordering::SeqCst) {
            self.token.cancel();
        }
    }

    /// Whether the transfer has produced its final result
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Completion signal of a running transfer
#[derive(Debug)]
pub struct TransferCompletion {
    rx: oneshot::Receiver<Result<u64, TransportError>>,
}

impl TransferCompletion {
    /// Wait for the transfer's final result
    pub async fn wait(self) -> Result<u64, TransportError> {
        self.rx.await.unwrap_or_else(|_| {
            Err(TransportError::Network(
                "transfer task ended without a result".to_string(),
            ))
        })
    }
}

/// A running transfer
///
/// The progress channel closes once the transfer has finished; drain it before
/// awaiting `completion` to observe every report in order.
#[derive(Debug)]
pub struct Transfer {
    /// Progress reports, in order
    pub progress: mpsc::UnboundedReceiver<TransferProgress>,
    /// Final result
    pub completion: TransferCompletion,
    /// Stop capability
    pub cancel: TransferCancel,
}

/// Wraps a [`TransportPrimitive`] into the [`Transfer`] contract
#[derive(Clone)]
pub struct TransportAdapter {
    primitive: Arc<dyn TransportPrimitive>,
}

impl TransportAdapter {
    /// Wrap a primitive
    pub fn new(primitive: Arc<dyn TransportPrimitive>) -> Self {
        Self { primitive }
    }

    /// Start transferring `url` into `destination`
    pub fn start(&self, url: String, destination: PathBuf) -> Transfer {
        self.spawn(url, destination, CancellationToken::new())
    }

    /// Start a transfer that is also cancelled when `parent` fires
    pub fn start_with_parent(
        &self,
        url: String,
        destination: PathBuf,
        parent: &CancellationToken,
    ) -> Transfer {
        self.spawn(url, destination, parent.child_token())
    }

    fn spawn(&self, url: String, destination: PathBuf, token: CancellationToken) -> Transfer {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));

        let primitive = Arc::clone(&self.primitive);
        let task_token = token.clone();
        let task_finished = Arc::clone(&finished);

        tokio::spawn(async move {
            let gate = task_token.clone();
            let on_progress = move |bytes_written: u64, total_bytes: Option<u64>| {
                // Nothing is reported once a cancel has been observed
                if !gate.is_cancelled() {
                    progress_tx
                        .send(TransferProgress {
                            bytes_written,
                            total_bytes,
                        })
                        .ok();
                }
            };

            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(TransportError::Cancelled),
                r = primitive.transfer(&url, &destination, &on_progress, &task_token) => r,
            };

            task_finished.store(true, Ordering::SeqCst);
            drop(on_progress);

            if let Err(ref e) = result {
                tracing::debug!(url = %url, error = %e, "Transfer ended with error");
            }
            done_tx.send(result).ok();
        });

        Transfer {
            progress: progress_rx,
            completion: TransferCompletion { rx: done_rx },
            cancel: TransferCancel { token, finished },
        }
    }
}
