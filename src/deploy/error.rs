//! Error types for the deploy step.

use thiserror::Error;

use crate::control_plane::JobId;
use crate::job::JobWaitError;
use crate::resolver::ResolutionError;
use crate::user_data::RenderError;

/// Errors raised while deploying or destroying a virtual machine.
///
/// Destroy variants are only produced during cleanup, where they are
/// reported and absorbed.
#[derive(Debug, Error)]
pub enum DeployError<ClientError>
where
    ClientError: std::error::Error + 'static,
{
    /// Raised when user data cannot be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Raised when a resource name cannot be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError<ClientError>),
    /// Raised when the deploy call is rejected or fails in transport.
    #[error("failed to deploy virtual machine: {0}")]
    Create(#[source] ClientError),
    /// Raised when the deploy response carries no virtual machine id.
    #[error("failed to deploy virtual machine: response for job {job_id} carried no id")]
    MissingId {
        /// Job handle returned alongside the blank id.
        job_id: JobId,
    },
    /// Raised when the deploy job fails or does not finish in time.
    #[error("virtual machine {id} did not become available: {source}")]
    Job {
        /// Identifier returned by the deploy call.
        id: String,
        /// Wait failure.
        #[source]
        source: JobWaitError<ClientError>,
    },
    /// Raised when the destroy call fails.
    #[error("failed to destroy virtual machine {id}: {source}")]
    Destroy {
        /// Virtual machine being destroyed.
        id: String,
        /// Client error.
        #[source]
        source: ClientError,
    },
    /// Raised when the destroy job fails or does not finish in time.
    #[error("destroy of virtual machine {id} did not complete: {source}")]
    DestroyJob {
        /// Virtual machine being destroyed.
        id: String,
        /// Wait failure.
        #[source]
        source: JobWaitError<ClientError>,
    },
}

impl<ClientError> DeployError<ClientError>
where
    ClientError: std::error::Error + 'static,
{
    /// Returns `true` when an async job ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Job {
                source: JobWaitError::Timeout { .. },
                ..
            } | Self::DestroyJob {
                source: JobWaitError::Timeout { .. },
                ..
            }
        )
    }
}
