//! Creates the deployment and follows it to a terminal state.

use std::collections::BTreeSet;
use std::path::Path;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use stagehand_protocol::{
    CreateDeploymentRequest, DeploymentPhase, DeploymentRecord, DeploymentState, ManifestEntry,
    Transition,
};
use stagehand_transfer::FileManifest;

use crate::api::DeployApi;
use crate::config::ClientConfig;
use crate::error::DeployError;
use crate::events::{DeployEvent, EventSink};
use crate::retry::with_retry;
use crate::types::{DeployPath, DeploymentOptions};

/// Builds the create-deployment body for an uploaded manifest.
///
/// Metadata keys that would overwrite a request field are dropped.
pub(crate) fn build_request(
    manifest: &FileManifest,
    source: &DeployPath,
    options: &DeploymentOptions,
) -> CreateDeploymentRequest {
    let root = source.root();
    let files = manifest
        .iter()
        .map(|file| ManifestEntry {
            sha: file.digest.clone(),
            size: file.size,
            names: file
                .names
                .iter()
                .map(|path| manifest_name(path, root))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        })
        .collect();

    let mut metadata = options.metadata.clone();
    for key in CreateDeploymentRequest::RESERVED_KEYS {
        if metadata.remove(key).is_some() {
            warn!(key, "ignoring metadata key reserved by the deployment request");
        }
    }

    CreateDeploymentRequest {
        files,
        total_files: manifest.total_files(),
        is_directory: source.is_directory(),
        default_name: options.default_name.clone(),
        metadata,
    }
}

/// Name of `path` inside the deployment: relative to `root` with `/`
/// separators, or the bare file name.
fn manifest_name(path: &Path, root: Option<&Path>) -> String {
    if let Some(relative) = root.and_then(|r| path.strip_prefix(r).ok()) {
        return relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
    }
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

pub(crate) struct Deployer<'a> {
    api: &'a dyn DeployApi,
    config: &'a ClientConfig,
}

impl<'a> Deployer<'a> {
    pub(crate) fn new(api: &'a dyn DeployApi, config: &'a ClientConfig) -> Self {
        Self { api, config }
    }

    /// Creates the deployment, then polls until it is ready.
    ///
    /// Emits `Created`, `StateChanged` and `Ready` as the state advances.
    /// A failed or canceled deployment, a poll failure that outlives its
    /// retries, and running past `poll.max_wait` are all errors.
    pub(crate) async fn run(
        &self,
        request: &CreateDeploymentRequest,
        events: &EventSink,
    ) -> Result<DeploymentRecord, DeployError> {
        let mut record = self
            .api
            .create_deployment(request)
            .await
            .map_err(|source| DeployError::Rejected {
                operation: "create deployment",
                source,
            })?;

        let id = record.id.clone();
        info!(id = %id, state = %record.state, files = request.files.len(), "deployment created");

        let started = Instant::now();
        let deadline = started + self.config.poll.max_wait;
        match tokio::time::timeout_at(deadline, self.follow(&id, record, started, events)).await {
            Ok(result) => result,
            Err(_) => Err(DeployError::Timeout {
                id,
                waited: started.elapsed(),
            }),
        }
    }

    /// Polls `id` until a terminal state. The surrounding deadline also
    /// bounds a status request that never answers.
    async fn follow(
        &self,
        id: &str,
        mut record: DeploymentRecord,
        started: Instant,
        events: &EventSink,
    ) -> Result<DeploymentRecord, DeployError> {
        let mut phase = DeploymentPhase::new();

        loop {
            if let Some(ready) = self.observe(&mut phase, record, events).await? {
                return Ok(ready);
            }

            let waited = started.elapsed();
            if waited >= self.config.poll.max_wait {
                return Err(DeployError::Timeout {
                    id: id.to_string(),
                    waited,
                });
            }

            tokio::time::sleep(self.config.poll.interval).await;
            record = with_retry(&self.config.retry, "poll deployment", |attempt| {
                trace!(id = %id, attempt, "polling deployment");
                self.api.deployment_status(id)
            })
            .await?;
        }
    }

    /// Feeds one reported record through the state machine and emits the
    /// matching event. Returns the record once it is ready.
    async fn observe(
        &self,
        phase: &mut DeploymentPhase,
        record: DeploymentRecord,
        events: &EventSink,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        match phase.observe(record.state) {
            Transition::Advanced { from, to } => {
                debug!(id = %record.id, from = ?from, to = %to, "deployment state advanced");

                if to == DeploymentState::Ready {
                    info!(id = %record.id, url = ?record.url, "deployment ready");
                    events.emit(DeployEvent::Ready(record.clone())).await;
                    return Ok(Some(record));
                }
                if to.is_failure() {
                    return Err(DeployError::DeploymentFailed { record });
                }

                let event = match from {
                    None => DeployEvent::Created(record),
                    Some(_) => DeployEvent::StateChanged(record),
                };
                events.emit(event).await;
                Ok(None)
            }
            Transition::Unchanged => Ok(None),
            Transition::Stale { current, reported } => {
                warn!(id = %record.id, %current, %reported, "ignoring out-of-order deployment state");
                Ok(None)
            }
        }
    }
}
