use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote lifecycle state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    #[serde(alias = "INITIALIZING")]
    Queued,
    Building,
    Ready,
    Error,
    Canceled,
}

impl DeploymentState {
    /// Position in the lifecycle. Terminal states share the highest rank.
    pub fn rank(self) -> u8 {
        match self {
            DeploymentState::Queued => 1,
            DeploymentState::Building => 2,
            DeploymentState::Ready | DeploymentState::Error | DeploymentState::Canceled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    pub fn is_failure(self) -> bool {
        matches!(self, DeploymentState::Error | DeploymentState::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentState::Queued => "QUEUED",
            DeploymentState::Building => "BUILDING",
            DeploymentState::Ready => "READY",
            DeploymentState::Error => "ERROR",
            DeploymentState::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local snapshot of a remote deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    #[serde(rename = "readyState")]
    pub state: DeploymentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    /// Human-readable failure detail, falling back to the state name.
    pub fn error_detail(&self) -> String {
        match (&self.error_code, &self.error_message) {
            (Some(code), Some(msg)) => format!("{code}: {msg}"),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => format!("deployment is {}", self.state),
        }
    }
}
