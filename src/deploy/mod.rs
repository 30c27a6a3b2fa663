//! The deploy step: creates a temporary virtual machine and destroys it
//! again when the run unwinds.
//!
//! `run` renders user data, resolves every named resource, submits the
//! deploy request and blocks until the control plane reports the deploy job
//! as finished. Only then is the virtual machine id published to the run
//! state. The id is remembered as soon as the deploy call returns it, so
//! `cleanup` can destroy the machine even when the job wait fails.

mod error;

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::control_plane::{ControlPlane, DeployParams};
use crate::job::wait_for_job;
use crate::request::ProvisioningRequest;
use crate::resolver::{ResolvedReferences, Resolver};
use crate::state::{RunState, StepAction, Ui};
use crate::step::{Step, StepFuture};
use crate::user_data::{BootContext, render_user_data};

pub use error::DeployError;

/// Builds a unique, time-ordered display name such as
/// `cloudstack-deploy-01890a5d-ac96-774b-bcce-b302099a8057`.
#[must_use]
pub fn display_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}

/// Creates one virtual machine per run and destroys it on unwind.
pub struct DeployVirtualMachine<C> {
    client: C,
    ui: Arc<dyn Ui>,
    request: ProvisioningRequest,
    created: Option<String>,
}

impl<C> DeployVirtualMachine<C>
where
    C: ControlPlane + Send + Sync,
{
    /// Creates the step.
    #[must_use]
    pub fn new(client: C, ui: Arc<dyn Ui>, request: ProvisioningRequest) -> Self {
        Self {
            client,
            ui,
            request,
            created: None,
        }
    }

    /// Identifier of the virtual machine this step still owns, if any.
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        self.created.as_deref()
    }

    /// Deploys the virtual machine and waits for its deploy job.
    ///
    /// The rendered user data is written to `state` before any remote call.
    /// The virtual machine id is not published to `state`; [`Step::run`]
    /// does that once this returns successfully.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError`] when rendering, resolution, the deploy call
    /// or the deploy job fails.
    pub async fn deploy(&mut self, state: &mut RunState) -> Result<String, DeployError<C::Error>> {
        self.ui.say("Creating virtual machine...");
        let name = display_name(&self.request.display_name_prefix);

        let context = BootContext {
            http_ip: state.http_ip.clone(),
            http_port: state.http_port,
            name: self.request.template_name.clone(),
        };
        let user_data = render_user_data(&self.request.user_data, &context)?;
        state.user_data = Some(user_data.clone());

        let resolved = Resolver::new(&self.client)
            .resolve_all(&self.request)
            .await?;
        let params = self.deploy_params(resolved, name, user_data, &state.ssh_key_name);

        info!(display_name = %params.display_name, "submitting deploy request");
        let (id, job_id) = self
            .client
            .deploy_virtual_machine(&params)
            .await
            .map_err(DeployError::Create)?
            .into_parts();
        if id.trim().is_empty() {
            return Err(DeployError::MissingId { job_id });
        }
        self.created = Some(id.clone());

        info!(vm_id = %id, job_id = %job_id, "waiting for deploy job");
        if let Err(source) = wait_for_job(&self.client, job_id, self.request.wait).await {
            return Err(DeployError::Job { id, source });
        }
        info!(vm_id = %id, "virtual machine deployed");
        Ok(id)
    }

    fn deploy_params(
        &self,
        resolved: ResolvedReferences,
        display_name: String,
        user_data: String,
        keypair: &str,
    ) -> DeployParams {
        DeployParams {
            service_offering_id: resolved.service_offering_id,
            template_id: resolved.template_id,
            zone_id: resolved.zone_id,
            disk_offering_id: resolved.disk_offering_id,
            display_name,
            network_ids: resolved.network_ids,
            keypair: keypair.to_owned(),
            user_data,
            hypervisor: self.request.hypervisor.clone(),
        }
    }

    async fn run_step(&mut self, state: &mut RunState) -> StepAction {
        match self.deploy(state).await {
            Ok(id) => {
                state.virtual_machine_id = Some(id);
                StepAction::Continue
            }
            Err(err) => {
                let message = err.to_string();
                error!(error = %message, "deploy step halted");
                self.ui.error(&message);
                state.error = Some(message);
                StepAction::Halt
            }
        }
    }

    async fn destroy(&mut self) -> Result<(), DeployError<C::Error>> {
        let Some(id) = self.created.take().filter(|recorded| !recorded.trim().is_empty()) else {
            return Ok(());
        };

        self.ui.say("Destroying virtual machine...");
        let job_id = match self.client.destroy_virtual_machine(&id).await {
            Ok(response) => response.into_job_id(),
            Err(source) => return Err(DeployError::Destroy { id, source }),
        };
        if let Err(source) = wait_for_job(&self.client, job_id, self.request.wait).await {
            return Err(DeployError::DestroyJob { id, source });
        }
        info!(vm_id = %id, "virtual machine destroyed");
        Ok(())
    }

    async fn cleanup_step(&mut self) {
        if let Err(err) = self.destroy().await {
            warn!(error = %err, "virtual machine cleanup failed");
            self.ui.warn(&format!("{err}; please destroy it manually"));
        }
    }
}

impl<C> Step for DeployVirtualMachine<C>
where
    C: ControlPlane + Send + Sync,
{
    fn name(&self) -> &str {
        "deploy_virtual_machine"
    }

    fn run<'a>(&'a mut self, state: &'a mut RunState) -> StepFuture<'a, StepAction> {
        Box::pin(self.run_step(state))
    }

    fn cleanup<'a>(&'a mut self, _state: &'a mut RunState) -> StepFuture<'a, ()> {
        Box::pin(self.cleanup_step())
    }
}
