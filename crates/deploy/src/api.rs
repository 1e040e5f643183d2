//! Remote API seam.
//!
//! [`DeployApi`] is implemented by [`HttpClient`](crate::client::HttpClient)
//! for the real service. Keeping the pipeline behind a trait decouples it
//! from transport and makes it testable with in-memory doubles.

use std::future::Future;
use std::pin::Pin;

use stagehand_protocol::{CreateDeploymentRequest, DeploymentRecord};

use crate::client::ApiError;

/// Boxed future returned by [`DeployApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Operations the pipeline needs from the deployment service.
///
/// Implementations are already bound to credentials and team scope.
pub trait DeployApi: Send + Sync {
    /// Returns the subset of `digests` the remote does not store yet.
    fn missing_digests<'a>(&'a self, digests: &'a [String]) -> ApiFuture<'a, Vec<String>>;

    /// Stores one blob. `data.len()` is sent as its size.
    fn upload_file<'a>(&'a self, digest: &'a str, data: &'a [u8]) -> ApiFuture<'a, ()>;

    /// Creates a deployment from already-uploaded blobs.
    fn create_deployment<'a>(
        &'a self,
        request: &'a CreateDeploymentRequest,
    ) -> ApiFuture<'a, DeploymentRecord>;

    /// Returns the current state of a deployment.
    fn deployment_status<'a>(&'a self, id: &'a str) -> ApiFuture<'a, DeploymentRecord>;
}
