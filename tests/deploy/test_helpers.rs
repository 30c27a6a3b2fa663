//! Shared fixtures for deploy BDD scenarios.

use std::time::Duration;

use cloudstack_deploy::test_support::{RecordingUi, ScriptedControlPlane};
use cloudstack_deploy::{
    NetworkRefs, ProvisioningRequest, ResourceKind, ResourceRef, RunState, SequenceOutcome,
    WaitSettings,
};
use rstest::fixture;
use thiserror::Error;

pub const VM_ID: &str = "vm-42";
pub const DEPLOY_JOB: &str = "job-1";
pub const CALLBACK_IP: &str = "10.0.2.2";
pub const CALLBACK_PORT: u16 = 8125;

const SCENARIO_WAIT: WaitSettings =
    WaitSettings::new(Duration::from_millis(1), Duration::from_millis(100));

#[derive(Clone, Debug)]
pub struct DeployContext {
    pub plane: ScriptedControlPlane,
    pub ui: RecordingUi,
    pub request: ProvisioningRequest,
    pub outcome: Option<DeployResult>,
}

#[derive(Clone, Debug)]
pub struct DeployResult {
    pub outcome: SequenceOutcome,
    pub state: RunState,
}

#[derive(Clone, Debug, Error)]
pub enum DeployTestError {
    #[error("invalid deploy fixture: {0}")]
    Fixture(String),
}

pub type DeployContextResult = Result<DeployContext, DeployTestError>;

#[fixture]
pub fn deploy_context_result() -> DeployContextResult {
    build_deploy_context()
}

#[fixture]
pub fn deploy_context(deploy_context_result: DeployContextResult) -> DeployContext {
    deploy_context_result
        .unwrap_or_else(|err| panic!("deploy context fixture should initialise: {err}"))
}

pub fn callback_state() -> RunState {
    RunState::new("scenario-key").with_callback(CALLBACK_IP, CALLBACK_PORT)
}

fn build_deploy_context() -> DeployContextResult {
    let plane = ScriptedControlPlane::new()
        .register(ResourceKind::ServiceOffering, "Small Instance", "so-1")
        .register(ResourceKind::Zone, "zone1", "zone-1")
        .register(ResourceKind::Template, "ubuntu-24.04", "tmpl-1")
        .register(ResourceKind::Network, "build-net", "net-1");
    plane.set_deploy_response(VM_ID, DEPLOY_JOB);

    let request = ProvisioningRequest::builder()
        .service_offering(ResourceRef::Name("Small Instance".to_owned()))
        .zone(ResourceRef::Name("zone1".to_owned()))
        .template(ResourceRef::Name("ubuntu-24.04".to_owned()))
        .networks(NetworkRefs::Names(vec!["build-net".to_owned()]))
        .hypervisor("KVM")
        .template_name("ubuntu-base")
        .wait(SCENARIO_WAIT)
        .build()
        .map_err(|err| DeployTestError::Fixture(format!("provisioning request: {err}")))?;

    Ok(DeployContext {
        plane,
        ui: RecordingUi::new(),
        request,
        outcome: None,
    })
}
