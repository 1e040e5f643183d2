//! In-memory [`DeployApi`] double for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use stagehand_protocol::{CreateDeploymentRequest, DeploymentRecord, DeploymentState};
use stagehand_transfer::{FileEntry, FileManifest, checksum_bytes, hash_files};
use tokio::sync::mpsc;

use crate::api::{ApiFuture, DeployApi};
use crate::client::ApiError;
use crate::events::DeployEvent;

pub(crate) const DEPLOYMENT_ID: &str = "dpl_test";

pub(crate) fn status_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        code: String::new(),
        message: format!("mock status {status}"),
    }
}

pub(crate) fn record(state: DeploymentState) -> DeploymentRecord {
    DeploymentRecord {
        id: DEPLOYMENT_ID.into(),
        state,
        url: (state == DeploymentState::Ready).then(|| "test.stagehand.app".into()),
        name: None,
        error_code: (state == DeploymentState::Error).then(|| "build_failed".into()),
        error_message: (state == DeploymentState::Error).then(|| "exit code 1".into()),
        created_at: None,
    }
}

/// Scripted remote.
///
/// `states` feeds the create response and then each poll; the last entry is
/// repeated once the script runs out. `Err(status)` entries fail that call.
#[derive(Default)]
pub(crate) struct MockApi {
    pub existing: Mutex<HashSet<String>>,
    /// digest -> number of attempts that fail with 503 before succeeding.
    pub upload_failures: Mutex<HashMap<String, u32>>,
    pub uploaded: Mutex<Vec<String>>,
    pub upload_attempts: AtomicU32,
    pub missing_calls: AtomicU32,
    pub created: Mutex<Vec<CreateDeploymentRequest>>,
    pub states: Mutex<VecDeque<Result<DeploymentState, u16>>>,
    pub polls: AtomicU32,
    /// Uploads currently inside `upload_file`, and the highest value seen.
    pub in_flight: AtomicU32,
    pub peak_in_flight: AtomicU32,
    /// Time each upload takes before answering.
    pub upload_delay: Mutex<Option<Duration>>,
    /// Status requests never answer.
    pub hang_polls: AtomicBool,
}

impl MockApi {
    pub fn with_states(states: &[DeploymentState]) -> Self {
        let api = Self::default();
        *api.states.lock().unwrap() = states.iter().copied().map(Ok).collect();
        api
    }

    pub fn script(&self, steps: Vec<Result<DeploymentState, u16>>) {
        *self.states.lock().unwrap() = steps.into();
    }

    pub fn fail_uploads(&self, digest: &str, times: u32) {
        self.upload_failures
            .lock()
            .unwrap()
            .insert(digest.to_string(), times);
    }

    pub fn preload(&self, digest: &str) {
        self.existing.lock().unwrap().insert(digest.to_string());
    }

    fn next_state(&self) -> Result<DeploymentRecord, ApiError> {
        let mut states = self.states.lock().unwrap();
        let step = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().copied()
        };
        match step {
            Some(Ok(state)) => Ok(record(state)),
            Some(Err(status)) => Err(status_error(status)),
            None => Err(status_error(404)),
        }
    }
}

impl DeployApi for MockApi {
    fn missing_digests<'a>(&'a self, digests: &'a [String]) -> ApiFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.missing_calls.fetch_add(1, Ordering::SeqCst);
            let existing = self.existing.lock().unwrap();
            Ok(digests
                .iter()
                .filter(|d| !existing.contains(*d))
                .cloned()
                .collect())
        })
    }

    fn upload_file<'a>(&'a self, digest: &'a str, data: &'a [u8]) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.upload_attempts.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let delay = *self.upload_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let result = self.accept_blob(digest, data);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn create_deployment<'a>(
        &'a self,
        request: &'a CreateDeploymentRequest,
    ) -> ApiFuture<'a, DeploymentRecord> {
        Box::pin(async move {
            self.created.lock().unwrap().push(request.clone());
            self.next_state()
        })
    }

    fn deployment_status<'a>(&'a self, _id: &'a str) -> ApiFuture<'a, DeploymentRecord> {
        Box::pin(async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.hang_polls.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.next_state()
        })
    }
}

impl MockApi {
    fn accept_blob(&self, digest: &str, data: &[u8]) -> Result<(), ApiError> {
        {
            let mut failures = self.upload_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(digest)
                && *left > 0
            {
                *left -= 1;
                return Err(status_error(503));
            }
        }
        if checksum_bytes(data) != digest {
            return Err(status_error(400));
        }
        self.existing.lock().unwrap().insert(digest.to_string());
        self.uploaded.lock().unwrap().push(digest.to_string());
        Ok(())
    }
}

/// Writes `files` (name, content) under `dir` and hashes them.
pub(crate) async fn manifest_for(dir: &Path, files: &[(&str, &str)]) -> FileManifest {
    let entries: Vec<FileEntry> = files
        .iter()
        .map(|(name, data)| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, data).unwrap();
            FileEntry::new(path, data.len() as u64)
        })
        .collect();
    hash_files(entries).await.unwrap()
}

/// Drains every event already sent on `rx`.
pub(crate) fn drain(rx: &mut mpsc::Receiver<DeployEvent>) -> Vec<DeployEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
