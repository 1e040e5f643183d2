use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.stagehand.dev";

/// Existence check: which of the submitted digests the remote lacks.
pub const MISSING_FILES_PATH: &str = "/v2/files/missing";

/// Raw blob upload.
pub const FILES_PATH: &str = "/v2/files";

/// Deployment create (POST) and status (GET `/{id}`).
pub const DEPLOYMENTS_PATH: &str = "/v13/deployments";

/// Header carrying the hex digest of an uploaded blob.
pub const DIGEST_HEADER: &str = "x-stagehand-digest";

/// Header carrying the byte length of an uploaded blob.
pub const LENGTH_HEADER: &str = "x-stagehand-length";

/// Query parameter selecting the team scope.
pub const TEAM_QUERY_PARAM: &str = "teamId";

/// Kind of event emitted by a deployment run.
///
/// The string forms are a stable contract shared with consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "hashes-calculated")]
    HashesCalculated,
    #[serde(rename = "file-count")]
    FileCount,
    #[serde(rename = "file-uploaded")]
    FileUploaded,
    #[serde(rename = "all-files-uploaded")]
    AllFilesUploaded,
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "state-changed")]
    StateChanged,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "error")]
    Error,
}

impl EventKind {
    /// Every event kind, in pipeline order.
    pub const ALL: [EventKind; 8] = [
        EventKind::HashesCalculated,
        EventKind::FileCount,
        EventKind::FileUploaded,
        EventKind::AllFilesUploaded,
        EventKind::Created,
        EventKind::StateChanged,
        EventKind::Ready,
        EventKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::HashesCalculated => "hashes-calculated",
            EventKind::FileCount => "file-count",
            EventKind::FileUploaded => "file-uploaded",
            EventKind::AllFilesUploaded => "all-files-uploaded",
            EventKind::Created => "created",
            EventKind::StateChanged => "state-changed",
            EventKind::Ready => "ready",
            EventKind::Error => "error",
        }
    }

    /// True for kinds that end the stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::Ready | EventKind::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event name.
#[derive(Debug, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}
