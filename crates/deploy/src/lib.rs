//! Upload-and-deploy pipeline.
//!
//! Turns a directory or a list of files into a live deployment and
//! reports progress as an ordered stream of [`DeployEvent`]s. The remote
//! service sits behind the [`DeployApi`] trait; [`HttpClient`] implements
//! it over HTTPS.
//!
//! # Pipeline
//!
//! 1. **Discover**: list the files to deploy ([`FileDiscovery`])
//! 2. **Hash**: group files by SHA-256 digest, emit `hashes-calculated`
//! 3. **Check**: ask the remote which digests it lacks, emit `file-count`
//! 4. **Upload**: send only the missing blobs in parallel, emit
//!    `file-uploaded` per blob and `all-files-uploaded` at the end
//! 5. **Deploy**: create the deployment and poll it, emitting `created`,
//!    `state-changed` and finally `ready` (or `error`)

pub mod api;
pub mod client;
pub mod config;
pub mod deploy;
mod deployer;
pub mod error;
pub mod events;
mod retry;
pub mod scanner;
pub mod types;
mod upload;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use api::{ApiFuture, DeployApi};
pub use client::{ApiError, HttpClient};
pub use config::{ClientConfig, ConfigError, PollConfig, RetryConfig};
pub use deploy::{DeploymentStream, create_deployment, create_deployment_with};
pub use error::{DeployError, ErrorKind, UsageError};
pub use events::DeployEvent;
pub use scanner::{FileDiscovery, WalkDiscovery};
pub use types::{DeployPath, DeploymentOptions};

pub use stagehand_protocol::{DeploymentRecord, DeploymentState, EventKind};
pub use stagehand_transfer::{FileManifest, HashedFile};
