//! Wire types for the Stagehand deployment API.

pub mod constants;
pub mod messages;
pub mod state;
pub mod types;

// Re-export primary types for convenience.
pub use constants::EventKind;
pub use messages::{
    ApiErrorBody, CreateDeploymentRequest, ManifestEntry, MissingFilesRequest,
    MissingFilesResponse,
};
pub use state::{DeploymentPhase, Transition};
pub use types::{DeploymentRecord, DeploymentState};
