//! Deploy step for building machine images on Apache CloudStack.
//!
//! The crate provisions one temporary virtual machine per build run:
//! resource names are resolved to identifiers, boot user data is rendered,
//! the machine is deployed and the step blocks until the control plane's
//! async job finishes. When the run unwinds the machine is destroyed again
//! (create → wait for the deploy job → destroy).

pub mod config;
pub mod control_plane;
pub mod deploy;
pub mod job;
pub mod request;
pub mod resolver;
pub mod state;
pub mod step;
pub mod test_support;
pub mod user_data;

pub use config::{ConfigError, DeployConfig};
pub use control_plane::{
    AsyncJobResult, ControlPlane, ControlPlaneFuture, DeployParams, JobId, JobStatus,
    LookupFilters, ResourceKind,
};
pub use deploy::{DeployError, DeployVirtualMachine};
pub use job::{JobWaitError, WaitSettings, wait_for_job};
pub use request::{NetworkRefs, ProvisioningRequest, ProvisioningRequestBuilder, ResourceRef};
pub use resolver::{ResolutionError, ResolvedReferences, Resolver};
pub use state::{RunState, StepAction, TracingUi, Ui};
pub use step::{SequenceOutcome, Step, StepSequence};
pub use user_data::{BootContext, RenderError, render_user_data};
