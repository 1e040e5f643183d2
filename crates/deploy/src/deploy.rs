//! Deployment orchestrator.
//!
//! Runs hash, upload and deploy in sequence on a spawned task and hands
//! the caller a [`DeploymentStream`] of progress events. Dropping the
//! stream cancels the run.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, info};

use stagehand_transfer::{FileEntry, HashError, hash_files};

use crate::api::DeployApi;
use crate::client::{ApiError, HttpClient};
use crate::deployer::{Deployer, build_request};
use crate::error::{DeployError, UsageError};
use crate::events::{DeployEvent, EventSink};
use crate::scanner::{FileDiscovery, WalkDiscovery};
use crate::types::{DeployPath, DeploymentOptions};
use crate::upload::Uploader;

/// Events buffered between the run and a slow consumer.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Starts deploying `path` against the configured API.
///
/// Argument problems are returned here and never reach the stream. Every
/// later failure arrives as a single final [`DeployEvent::Error`].
///
/// # Errors
///
/// A [`UsageError`] for a missing path or token, a token that cannot be
/// sent as a header, or a call made outside a Tokio runtime.
pub fn create_deployment(
    path: impl Into<DeployPath>,
    options: DeploymentOptions,
) -> Result<DeploymentStream, UsageError> {
    let path = path.into();
    let token = validate(&path, &options)?;

    let client = match HttpClient::new(token, options.team_id.clone(), &options.config) {
        Ok(client) => client,
        Err(ApiError::InvalidToken) => return Err(UsageError::InvalidToken),
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            return Ok(DeploymentStream::failed(DeployError::Client(err)));
        }
    };

    create_deployment_with(path, options, Arc::new(client), Arc::new(WalkDiscovery))
}

/// Like [`create_deployment`], with the remote API and file discovery
/// supplied by the caller. The run is spawned on the current Tokio runtime.
pub fn create_deployment_with(
    path: impl Into<DeployPath>,
    options: DeploymentOptions,
    api: Arc<dyn DeployApi>,
    discovery: Arc<dyn FileDiscovery>,
) -> Result<DeploymentStream, UsageError> {
    let source = path.into();
    validate(&source, &options)?;
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| UsageError::NoRuntime)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let events = EventSink::new(tx, cancel.clone());
    let pipeline = Pipeline {
        source,
        options,
        api,
        discovery,
    };

    let token = cancel.clone();
    runtime.spawn(async move {
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = pipeline.run(&events) => Some(result),
        };

        match outcome {
            None => info!("deployment run cancelled"),
            Some(Ok(())) => {}
            Some(Err(err)) => {
                error!(code = err.code(), error = %err, "deployment failed");
                events.emit(DeployEvent::Error(err)).await;
            }
        }
    });

    Ok(DeploymentStream::new(rx, cancel))
}

/// Checks arguments and returns the token.
fn validate<'o>(path: &DeployPath, options: &'o DeploymentOptions) -> Result<&'o str, UsageError> {
    if path.is_missing() {
        return Err(UsageError::MissingPath);
    }
    match options.token.as_deref() {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(UsageError::TokenNotProvided),
    }
}

struct Pipeline {
    source: DeployPath,
    options: DeploymentOptions,
    api: Arc<dyn DeployApi>,
    discovery: Arc<dyn FileDiscovery>,
}

impl Pipeline {
    async fn run(&self, events: &EventSink) -> Result<(), DeployError> {
        let entries = self.collect_entries().await?;
        info!(
            files = entries.len(),
            directory = self.source.is_directory(),
            "hashing files"
        );

        let manifest = Arc::new(hash_files(entries).await?);
        info!(
            blobs = manifest.len(),
            files = manifest.total_files(),
            bytes = manifest.total_bytes(),
            "hashes calculated"
        );
        events
            .emit(DeployEvent::HashesCalculated(manifest.clone()))
            .await;

        let config = &self.options.config;
        Uploader::new(self.api.as_ref(), config)
            .run(&manifest, events)
            .await?;
        events
            .emit(DeployEvent::AllFilesUploaded(manifest.clone()))
            .await;

        let request = build_request(&manifest, &self.source, &self.options);
        Deployer::new(self.api.as_ref(), config)
            .run(&request, events)
            .await?;
        Ok(())
    }

    async fn collect_entries(&self) -> Result<Vec<FileEntry>, DeployError> {
        match &self.source {
            DeployPath::Directory(root) => {
                let discovery = Arc::clone(&self.discovery);
                let walk_root = root.clone();
                tokio::task::spawn_blocking(move || discovery.discover(&walk_root))
                    .await
                    .map_err(std::io::Error::other)
                    .and_then(|listed| listed)
                    .map_err(|source| DeployError::Discovery {
                        path: root.clone(),
                        source,
                    })
            }
            DeployPath::File(path) => Ok(vec![file_entry(path).await?]),
            DeployPath::Files(paths) => {
                let mut entries = Vec::with_capacity(paths.len());
                for path in paths {
                    entries.push(file_entry(path).await?);
                }
                Ok(entries)
            }
        }
    }
}

async fn file_entry(path: &Path) -> Result<FileEntry, DeployError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(FileEntry::new(path, metadata.len()))
}

/// Progress events of one deployment run, in order.
///
/// Ends after `Ready` or `Error`, or once the run is cancelled. Dropping
/// the stream cancels the run.
pub struct DeploymentStream {
    rx: mpsc::Receiver<DeployEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl DeploymentStream {
    fn new(rx: mpsc::Receiver<DeployEvent>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// A stream that yields `err` and ends.
    fn failed(err: DeployError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this cannot fail.
        let _ = tx.try_send(DeployEvent::Error(err));
        Self::new(rx, CancellationToken::new())
    }

    /// Next event, or `None` once the run has finished or been cancelled.
    pub async fn recv(&mut self) -> Option<DeployEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Stops the run. No event is yielded afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for DeploymentStream {
    type Item = DeployEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<DeployEvent>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}
