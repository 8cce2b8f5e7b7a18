//! Event-stream assertions for integration tests

use std::time::Duration;

use music_dl::{DownloadUpdate, Event, Status, TaskId};
use tokio::sync::broadcast::{Receiver, error::RecvError};

/// Wait for `id` to reach Completed or Error and return the terminal update
///
/// Returns `None` on timeout or if the channel closes first.
pub async fn wait_for_terminal(
    events: &mut Receiver<Event>,
    id: &TaskId,
    timeout: Duration,
) -> Option<DownloadUpdate> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Update(update))
                    if update.id == *id
                        && matches!(update.status, Status::Completed | Status::Error) =>
                {
                    return Some(update);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
