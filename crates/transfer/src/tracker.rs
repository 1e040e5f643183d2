//! Per-digest upload state.

use std::collections::BTreeMap;
use std::fmt;

use crate::TransferError;
use crate::types::FileManifest;

/// Upload lifecycle of a single digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    InFlight,
    Complete,
    Failed(String),
}

impl UploadState {
    fn name(&self) -> &'static str {
        match self {
            UploadState::Pending => "pending",
            UploadState::InFlight => "in-flight",
            UploadState::Complete => "complete",
            UploadState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadState::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Tracks the upload state of every digest in a manifest.
///
/// Transitions are one-way: `pending -> in-flight -> complete | failed`, or
/// `pending -> complete` when the remote already stores the blob. Anything
/// else is rejected, so a completed digest can never be uploaded again.
#[derive(Debug, Clone)]
pub struct UploadTracker {
    states: BTreeMap<String, UploadState>,
}

impl UploadTracker {
    /// Creates a tracker with every digest of `manifest` pending.
    pub fn new(manifest: &FileManifest) -> Self {
        Self {
            states: manifest
                .digests()
                .map(|d| (d.to_string(), UploadState::Pending))
                .collect(),
        }
    }

    pub fn state(&self, digest: &str) -> Option<&UploadState> {
        self.states.get(digest)
    }

    /// Marks a digest the remote already has as complete.
    pub fn mark_present(&mut self, digest: &str) -> Result<(), TransferError> {
        self.transition(digest, UploadState::Complete, |s| {
            matches!(s, UploadState::Pending)
        })
    }

    /// Marks a digest as being transferred.
    pub fn start(&mut self, digest: &str) -> Result<(), TransferError> {
        self.transition(digest, UploadState::InFlight, |s| {
            matches!(s, UploadState::Pending)
        })
    }

    /// Marks an in-flight digest as acknowledged by the remote.
    pub fn complete(&mut self, digest: &str) -> Result<(), TransferError> {
        self.transition(digest, UploadState::Complete, |s| {
            matches!(s, UploadState::InFlight)
        })
    }

    /// Marks an in-flight digest as failed.
    pub fn fail(&mut self, digest: &str, reason: impl Into<String>) -> Result<(), TransferError> {
        self.transition(digest, UploadState::Failed(reason.into()), |s| {
            matches!(s, UploadState::InFlight)
        })
    }

    /// Digests still waiting to be uploaded, in digest order.
    pub fn pending(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, UploadState::Pending))
            .map(|(d, _)| d.clone())
            .collect()
    }

    pub fn completed(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, UploadState::Complete))
            .count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// True once every digest is complete.
    pub fn all_complete(&self) -> bool {
        self.completed() == self.states.len()
    }

    fn transition(
        &mut self,
        digest: &str,
        to: UploadState,
        allowed_from: impl Fn(&UploadState) -> bool,
    ) -> Result<(), TransferError> {
        let state = self
            .states
            .get_mut(digest)
            .ok_or_else(|| TransferError::UnknownDigest(digest.to_string()))?;

        if !allowed_from(state) {
            return Err(TransferError::InvalidTransition {
                digest: digest.to_string(),
                from: state.name(),
                to: to.name(),
            });
        }

        *state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(digests: &[&str]) -> FileManifest {
        let mut m = FileManifest::new();
        for d in digests {
            m.insert(d.to_string(), 1, format!("{d}.txt").into());
        }
        m
    }

    #[test]
    fn starts_all_pending() {
        let tracker = UploadTracker::new(&manifest(&["a", "b"]));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.pending(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tracker.state("a"), Some(&UploadState::Pending));
        assert!(!tracker.all_complete());
    }

    #[test]
    fn upload_lifecycle() {
        let mut tracker = UploadTracker::new(&manifest(&["a"]));
        tracker.start("a").unwrap();
        assert_eq!(tracker.state("a"), Some(&UploadState::InFlight));
        assert!(tracker.pending().is_empty());
        tracker.complete("a").unwrap();
        assert!(tracker.all_complete());
    }

    #[test]
    fn already_present_skips_in_flight() {
        let mut tracker = UploadTracker::new(&manifest(&["a", "b"]));
        tracker.mark_present("a").unwrap();
        assert_eq!(tracker.pending(), vec!["b".to_string()]);
        assert_eq!(tracker.completed(), 1);
    }

    #[test]
    fn complete_digest_cannot_restart() {
        let mut tracker = UploadTracker::new(&manifest(&["a"]));
        tracker.mark_present("a").unwrap();
        let err = tracker.start("a").unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidTransition {
                from: "complete",
                to: "in-flight",
                ..
            }
        ));
    }

    #[test]
    fn failed_is_terminal() {
        let mut tracker = UploadTracker::new(&manifest(&["a"]));
        tracker.start("a").unwrap();
        tracker.fail("a", "boom").unwrap();
        assert_eq!(tracker.state("a"), Some(&UploadState::Failed("boom".into())));
        assert!(tracker.complete("a").is_err());
        assert!(tracker.start("a").is_err());
        assert_eq!(tracker.state("a").unwrap().to_string(), "failed(boom)");
    }

    #[test]
    fn cannot_complete_without_starting() {
        let mut tracker = UploadTracker::new(&manifest(&["a"]));
        assert!(tracker.complete("a").is_err());
        assert!(tracker.fail("a", "x").is_err());
    }

    #[test]
    fn unknown_digest_rejected() {
        let mut tracker = UploadTracker::new(&manifest(&["a"]));
        assert!(matches!(
            tracker.start("zz"),
            Err(TransferError::UnknownDigest(d)) if d == "zz"
        ));
    }

    #[test]
    fn empty_manifest_is_trivially_complete() {
        let tracker = UploadTracker::new(&FileManifest::new());
        assert!(tracker.is_empty());
        assert!(tracker.all_complete());
    }
}
