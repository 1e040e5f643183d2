//! Uploads the blobs the remote does not have yet.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, error, info, trace};

use stagehand_transfer::{
    FileManifest, HashError, HashedFile, TransferError, UploadTracker, checksum_bytes,
};

use crate::api::DeployApi;
use crate::config::ClientConfig;
use crate::error::DeployError;
use crate::events::{DeployEvent, EventSink};
use crate::retry::with_retry;

/// Totals of a finished upload phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct UploadSummary {
    pub total: usize,
    pub already_present: usize,
    pub uploaded: usize,
    pub bytes_uploaded: u64,
}

type UploadFuture<'f> =
    Pin<Box<dyn Future<Output = (&'f HashedFile, Result<(), DeployError>)> + Send + 'f>>;

pub(crate) struct Uploader<'a> {
    api: &'a dyn DeployApi,
    config: &'a ClientConfig,
}

impl<'a> Uploader<'a> {
    pub(crate) fn new(api: &'a dyn DeployApi, config: &'a ClientConfig) -> Self {
        Self { api, config }
    }

    /// Asks the remote which digests it lacks, then uploads exactly those,
    /// at most `upload_concurrency` at a time.
    ///
    /// Emits `FileCount` once and `FileUploaded` per acknowledged blob. The
    /// first upload that fails for good aborts the phase; uploads still in
    /// flight are dropped with it.
    pub(crate) async fn run(
        &self,
        manifest: &FileManifest,
        events: &EventSink,
    ) -> Result<UploadSummary, DeployError> {
        let digests: Vec<String> = manifest.digests().map(str::to_string).collect();
        let mut tracker = UploadTracker::new(manifest);

        let missing: HashSet<String> = if digests.is_empty() {
            HashSet::new()
        } else {
            with_retry(&self.config.retry, "check missing files", |_| {
                self.api.missing_digests(&digests)
            })
            .await?
            .into_iter()
            .collect()
        };

        if let Some(unknown) = missing.iter().find(|d| !manifest.contains(d)) {
            return Err(DeployError::Protocol(format!(
                "remote reported unknown digest {unknown} as missing"
            )));
        }

        for digest in digests.iter().filter(|d| !missing.contains(*d)) {
            tracker.mark_present(digest).map_err(tracker_error)?;
        }

        info!(
            total = digests.len(),
            missing = missing.len(),
            "existence check complete"
        );
        events
            .emit(DeployEvent::FileCount {
                total: digests.len(),
                missing: missing.len(),
            })
            .await;

        let pending = tracker.pending();
        for digest in &pending {
            tracker.start(digest).map_err(tracker_error)?;
        }

        let mut summary = UploadSummary {
            total: digests.len(),
            already_present: digests.len() - pending.len(),
            ..UploadSummary::default()
        };

        let files: Vec<&HashedFile> = pending.iter().filter_map(|d| manifest.get(d)).collect();
        let jobs: Vec<UploadFuture<'_>> = files
            .into_iter()
            .map(|file| Box::pin(self.upload_one(file)) as UploadFuture<'_>)
            .collect();
        let mut uploads =
            stream::iter(jobs).buffer_unordered(self.config.upload_concurrency.max(1));

        while let Some((file, result)) = uploads.next().await {
            match result {
                Ok(()) => {
                    tracker.complete(&file.digest).map_err(tracker_error)?;
                    summary.uploaded += 1;
                    summary.bytes_uploaded += file.size;
                    events.emit(DeployEvent::FileUploaded(file.clone())).await;
                }
                Err(err) => {
                    tracker
                        .fail(&file.digest, err.to_string())
                        .map_err(tracker_error)?;
                    error!(digest = %file.digest, error = %err, "upload failed");
                    return Err(err);
                }
            }
        }

        if !tracker.all_complete() {
            return Err(DeployError::Protocol(format!(
                "{} of {} blobs not uploaded",
                tracker.len() - tracker.completed(),
                tracker.len()
            )));
        }

        info!(
            total = summary.total,
            uploaded = summary.uploaded,
            already_present = summary.already_present,
            bytes = summary.bytes_uploaded,
            "all files uploaded"
        );
        Ok(summary)
    }

    async fn upload_one<'f>(
        &self,
        file: &'f HashedFile,
    ) -> (&'f HashedFile, Result<(), DeployError>) {
        let result = self.send_blob(file).await;
        (file, result)
    }

    /// Re-reads the blob, makes sure it still matches the manifest, and
    /// sends it.
    async fn send_blob(&self, file: &HashedFile) -> Result<(), DeployError> {
        let Some(path) = file.source_path() else {
            return Err(DeployError::Protocol(format!(
                "blob {} has no source path",
                file.digest
            )));
        };

        let data = tokio::fs::read(path).await.map_err(|source| HashError::Io {
            path: path.clone(),
            source,
        })?;

        if data.len() as u64 != file.size {
            return Err(HashError::SizeMismatch {
                path: path.clone(),
                expected: file.size,
                actual: data.len() as u64,
            }
            .into());
        }

        let actual = checksum_bytes(&data);
        if actual != file.digest {
            return Err(HashError::DigestMismatch {
                path: path.clone(),
                expected: file.digest.clone(),
                actual,
            }
            .into());
        }

        with_retry(&self.config.retry, "upload file", |attempt| {
            trace!(digest = %file.digest, attempt, "sending blob");
            self.api.upload_file(&file.digest, &data)
        })
        .await?;

        debug!(digest = %file.digest, size = file.size, "blob uploaded");
        Ok(())
    }
}

fn tracker_error(err: TransferError) -> DeployError {
    DeployError::Protocol(err.to_string())
}
