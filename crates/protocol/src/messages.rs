use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks which of the given digests the remote does not store yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFilesRequest {
    pub shas: Vec<String>,
}

/// One blob in a deployment manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sha: String,
    pub size: u64,
    /// Paths at which the blob appears in the deployment.
    pub names: Vec<String>,
}

/// Creates a deployment from already-uploaded blobs.
///
/// `metadata` is flattened into the top-level object, so its keys must not
/// collide with the named fields (see [`CreateDeploymentRequest::RESERVED_KEYS`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub files: Vec<ManifestEntry>,
    pub total_files: usize,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_name: Option<String>,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CreateDeploymentRequest {
    /// Top-level keys owned by the request itself.
    pub const RESERVED_KEYS: [&'static str; 4] =
        ["files", "totalFiles", "isDirectory", "defaultName"];
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Digests the remote still needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFilesResponse {
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Error envelope returned by the API on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
