use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::blob::BlobStore;

/// Queue of blob URLs awaiting best-effort deletion.
///
/// Row-level deletes commit first; the orphaned objects are removed out of
/// band by a single worker task. Failures are logged and never surface to
/// the request that enqueued them.
#[derive(Clone)]
pub struct CleanupQueue {
    sender: UnboundedSender<String>,
}

impl CleanupQueue {
    /// Spawn the worker task and return a handle for enqueuing deletions.
    pub fn spawn(blob: BlobStore) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(url) = receiver.recv().await {
                match blob.delete(&url).await {
                    Ok(()) => info!(%url, "deleted orphaned blob"),
                    Err(err) => warn!(%url, ?err, "blob cleanup failed"),
                }
            }
        });

        Self { sender }
    }

    pub fn enqueue(&self, url: String) {
        if self.sender.send(url).is_err() {
            warn!("blob cleanup worker is gone; deletion dropped");
        }
    }

    pub fn enqueue_all<I: IntoIterator<Item = String>>(&self, urls: I) {
        for url in urls {
            self.enqueue(url);
        }
    }
}
