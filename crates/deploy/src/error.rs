//! Deploy error types.

use std::path::PathBuf;
use std::time::Duration;

use stagehand_protocol::{DeploymentRecord, DeploymentState};
use stagehand_transfer::HashError;

use crate::client::ApiError;

/// Invalid arguments, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Path not provided")]
    MissingPath,

    #[error("Options must include a `token`")]
    TokenNotProvided,

    #[error("token contains characters not allowed in an HTTP header")]
    InvalidToken,

    #[error("must be called from within a Tokio runtime")]
    NoRuntime,
}

impl UsageError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            UsageError::MissingPath => "missing_path",
            UsageError::TokenNotProvided => "token_not_provided",
            UsageError::InvalidToken => "invalid_token",
            UsageError::NoRuntime => "no_runtime",
        }
    }
}

/// Broad class of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments.
    Usage,
    /// Local failure: filesystem access or HTTP client setup.
    Io,
    /// Retryable remote failure that exhausted its attempts.
    TransientRemote,
    /// The remote refused a request or reported the deployment failed.
    TerminalRemote,
    /// The deployment did not settle within the wait budget.
    Timeout,
}

/// Errors produced by a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to list files under {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    File(#[from] HashError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] ApiError),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    #[error("{operation} rejected: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("deployment {} ended in {}: {}", record.id, record.state, record.error_detail())]
    DeploymentFailed { record: DeploymentRecord },

    #[error("deployment {id} did not finish within {waited:?}")]
    Timeout { id: String, waited: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Usage(_) => ErrorKind::Usage,
            DeployError::Discovery { .. } | DeployError::File(_) | DeployError::Client(_) => {
                ErrorKind::Io
            }
            DeployError::RetriesExhausted { .. } => ErrorKind::TransientRemote,
            DeployError::Rejected { .. }
            | DeployError::DeploymentFailed { .. }
            | DeployError::Protocol(_) => ErrorKind::TerminalRemote,
            DeployError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            DeployError::Usage(e) => e.code(),
            DeployError::Discovery { .. } => "discovery_failed",
            DeployError::File(HashError::Io { .. }) => "file_read_failed",
            DeployError::File(_) => "file_changed",
            DeployError::Client(_) => "client_init_failed",
            DeployError::RetriesExhausted { .. } => "retries_exhausted",
            DeployError::Rejected { source, .. } => match source.remote_code() {
                Some(code) => code,
                None => "request_rejected",
            },
            DeployError::DeploymentFailed { record } => match record.error_code.as_deref() {
                Some(code) => code,
                None if record.state == DeploymentState::Canceled => "deployment_canceled",
                None => "deployment_error",
            },
            DeployError::Timeout { .. } => "deployment_timeout",
            DeployError::Protocol(_) => "protocol_error",
        }
    }

    /// Remote deployment snapshot attached to the error, if any.
    pub fn deployment(&self) -> Option<&DeploymentRecord> {
        match self {
            DeployError::DeploymentFailed { record } => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str, code: Option<&str>) -> DeploymentRecord {
        let mut value = serde_json::json!({"id": "dpl_1", "readyState": state});
        if let Some(code) = code {
            value["errorCode"] = code.into();
            value["errorMessage"] = "boom".into();
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn usage_codes() {
        assert_eq!(UsageError::MissingPath.code(), "missing_path");
        assert_eq!(UsageError::TokenNotProvided.code(), "token_not_provided");
        let err = DeployError::from(UsageError::TokenNotProvided);
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.code(), "token_not_provided");
    }

    #[test]
    fn deployment_failure_codes() {
        let err = DeployError::DeploymentFailed {
            record: record("ERROR", Some("build_failed")),
        };
        assert_eq!(err.kind(), ErrorKind::TerminalRemote);
        assert_eq!(err.code(), "build_failed");
        assert_eq!(err.to_string(), "deployment dpl_1 ended in ERROR: build_failed: boom");
        assert_eq!(err.deployment().unwrap().id, "dpl_1");

        let canceled = DeployError::DeploymentFailed {
            record: record("CANCELED", None),
        };
        assert_eq!(canceled.code(), "deployment_canceled");

        let plain = DeployError::DeploymentFailed {
            record: record("ERROR", None),
        };
        assert_eq!(plain.code(), "deployment_error");
    }

    #[test]
    fn remote_kinds() {
        let exhausted = DeployError::RetriesExhausted {
            operation: "upload file",
            attempts: 3,
            source: ApiError::Status {
                status: 503,
                code: String::new(),
                message: "unavailable".into(),
            },
        };
        assert_eq!(exhausted.kind(), ErrorKind::TransientRemote);
        assert_eq!(exhausted.code(), "retries_exhausted");

        let rejected = DeployError::Rejected {
            operation: "create deployment",
            source: ApiError::Status {
                status: 403,
                code: "forbidden".into(),
                message: "no".into(),
            },
        };
        assert_eq!(rejected.kind(), ErrorKind::TerminalRemote);
        assert_eq!(rejected.code(), "forbidden");
    }

    #[test]
    fn io_and_timeout_kinds() {
        let io = DeployError::File(HashError::Io {
            path: "a.txt".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(io.code(), "file_read_failed");

        let timeout = DeployError::Timeout {
            id: "dpl_1".into(),
            waited: Duration::from_secs(5),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(timeout.code(), "deployment_timeout");
    }

    #[test]
    fn client_setup_failure_is_local() {
        let err = DeployError::Client(ApiError::Json(
            serde_json::from_str::<u8>("x").unwrap_err(),
        ));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.code(), "client_init_failed");
        assert!(err.to_string().starts_with("failed to build HTTP client"));
    }

    #[test]
    fn no_runtime_is_a_usage_error() {
        let err = DeployError::from(UsageError::NoRuntime);
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.code(), "no_runtime");
    }
}
