//! Events yielded by a deployment run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stagehand_protocol::{DeploymentRecord, EventKind};
use stagehand_transfer::{FileManifest, HashedFile};

use crate::error::DeployError;

/// One step of a deployment run, in the order it happened.
#[derive(Debug)]
pub enum DeployEvent {
    /// Every file has been hashed. Always the first event.
    HashesCalculated(Arc<FileManifest>),
    /// Existence check done: `missing` of `total` blobs need uploading.
    FileCount { total: usize, missing: usize },
    /// The remote acknowledged one blob.
    FileUploaded(HashedFile),
    /// Every blob is now stored remotely.
    AllFilesUploaded(Arc<FileManifest>),
    /// First observed state of the new deployment.
    Created(DeploymentRecord),
    /// The deployment advanced to another non-terminal state.
    StateChanged(DeploymentRecord),
    /// The deployment is live. Last event of a successful run.
    Ready(DeploymentRecord),
    /// The run failed. Always the last event.
    Error(DeployError),
}

impl DeployEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DeployEvent::HashesCalculated(_) => EventKind::HashesCalculated,
            DeployEvent::FileCount { .. } => EventKind::FileCount,
            DeployEvent::FileUploaded(_) => EventKind::FileUploaded,
            DeployEvent::AllFilesUploaded(_) => EventKind::AllFilesUploaded,
            DeployEvent::Created(_) => EventKind::Created,
            DeployEvent::StateChanged(_) => EventKind::StateChanged,
            DeployEvent::Ready(_) => EventKind::Ready,
            DeployEvent::Error(_) => EventKind::Error,
        }
    }

    /// Deployment snapshot carried by status events and failed-deployment errors.
    pub fn deployment(&self) -> Option<&DeploymentRecord> {
        match self {
            DeployEvent::Created(r) | DeployEvent::StateChanged(r) | DeployEvent::Ready(r) => {
                Some(r)
            }
            DeployEvent::Error(e) => e.deployment(),
            _ => None,
        }
    }
}

/// Sending half of the event stream.
///
/// A failed send means the consumer went away; the run's cancellation token
/// is tripped so the producer stops at its next suspension point.
pub(crate) struct EventSink {
    tx: mpsc::Sender<DeployEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<DeployEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub(crate) async fn emit(&self, event: DeployEvent) {
        if self.tx.send(event).await.is_err() {
            self.cancel.cancel();
        }
    }

    /// Creates a sink plus its receiver, for component tests.
    #[cfg(test)]
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeployEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, CancellationToken::new()), rx)
    }
}
