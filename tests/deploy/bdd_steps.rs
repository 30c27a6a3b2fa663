//! BDD step definitions for the deploy step workflow.

use std::sync::Arc;

use cloudstack_deploy::{
    DeployVirtualMachine, JobId, JobStatus, NetworkRefs, SequenceOutcome, StepSequence,
};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{DEPLOY_JOB, DeployContext, DeployResult, VM_ID, callback_state};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a resolvable deploy request")]
fn resolvable_request(deploy_context: DeployContext) -> DeployContext {
    deploy_context
}

#[given("user data \"{template}\"")]
fn user_data_template(mut deploy_context: DeployContext, template: String) -> DeployContext {
    deploy_context.request.user_data = template;
    deploy_context
}

#[given("the deploy job fails with code \"{code}\"")]
fn deploy_job_fails(deploy_context: DeployContext, code: i64) -> DeployContext {
    deploy_context
        .plane
        .fail_job(&JobId::new(DEPLOY_JOB), code, "Insufficient capacity");
    deploy_context
}

#[given("the deploy job never finishes")]
fn deploy_job_pending(deploy_context: DeployContext) -> DeployContext {
    deploy_context
        .plane
        .script_job(&JobId::new(DEPLOY_JOB), [JobStatus::Pending]);
    deploy_context
}

#[given("the deploy call fails")]
fn deploy_call_fails(deploy_context: DeployContext) -> DeployContext {
    deploy_context.plane.fail_deploy();
    deploy_context
}

#[given("the destroy call fails")]
fn destroy_call_fails(deploy_context: DeployContext) -> DeployContext {
    deploy_context.plane.fail_destroy();
    deploy_context
}

#[given("the request also names network \"{network}\"")]
fn extra_network(mut deploy_context: DeployContext, network: String) -> DeployContext {
    let mut names = match &deploy_context.request.networks {
        NetworkRefs::Names(names) => names.clone(),
        NetworkRefs::Ids(_) => Vec::new(),
    };
    names.push(network);
    deploy_context.request.networks = NetworkRefs::Names(names);
    deploy_context
}

#[when("I run the deploy step")]
fn run_deploy_step(deploy_context: DeployContext) -> Result<DeployContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let DeployContext {
        plane, ui, request, ..
    } = deploy_context;

    let step = DeployVirtualMachine::new(plane.clone(), Arc::new(ui.clone()), request.clone());
    let mut state = callback_state();
    let outcome = runtime.block_on(async {
        StepSequence::new()
            .with_step(step)
            .run(&mut state, &CancellationToken::new())
            .await
    });

    Ok(DeployContext {
        plane,
        ui,
        request,
        outcome: Some(DeployResult { outcome, state }),
    })
}

fn result(deploy_context: &DeployContext) -> Result<&DeployResult, StepError> {
    deploy_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

#[then("the run completes")]
fn run_completes(deploy_context: &DeployContext) -> Result<(), StepError> {
    let run = result(deploy_context)?;
    if run.outcome == SequenceOutcome::Completed {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected completion, got {:?} ({:?})",
            run.outcome, run.state.error
        )))
    }
}

#[then("the run halts")]
fn run_halts(deploy_context: &DeployContext) -> Result<(), StepError> {
    let run = result(deploy_context)?;
    match &run.outcome {
        SequenceOutcome::Halted { step } if step == "deploy_virtual_machine" => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected the deploy step to halt, got {other:?}"
        ))),
    }
}

#[then("the published virtual machine id is \"{id}\"")]
fn published_id(deploy_context: &DeployContext, id: String) -> Result<(), StepError> {
    let run = result(deploy_context)?;
    if run.state.virtual_machine_id.as_deref() == Some(id.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected published id {id}, got {:?}",
            run.state.virtual_machine_id
        )))
    }
}

#[then("no virtual machine id is published")]
fn no_published_id(deploy_context: &DeployContext) -> Result<(), StepError> {
    let run = result(deploy_context)?;
    match &run.state.virtual_machine_id {
        None => Ok(()),
        Some(id) => Err(StepError::Assertion(format!(
            "expected no published id, got {id}"
        ))),
    }
}

#[then("the deployed user data is \"{expected}\"")]
fn deployed_user_data(deploy_context: &DeployContext, expected: String) -> Result<(), StepError> {
    let calls = deploy_context.plane.deploy_calls();
    let params = calls
        .first()
        .ok_or_else(|| StepError::Assertion(String::from("missing deploy call")))?;
    if params.user_data == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected user data {expected}, got {}",
            params.user_data
        )))
    }
}

#[then("the run error mentions \"{fragment}\"")]
fn run_error_mentions(deploy_context: &DeployContext, fragment: String) -> Result<(), StepError> {
    let run = result(deploy_context)?;
    match &run.state.error {
        Some(message) if message.contains(&fragment) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected run error containing '{fragment}', got {other:?}"
        ))),
    }
}

#[then("virtual machine \"{id}\" is destroyed")]
fn machine_destroyed(deploy_context: &DeployContext, id: String) -> Result<(), StepError> {
    let calls = deploy_context.plane.destroy_calls();
    if calls == vec![id.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exactly one destroy of {id}, got {calls:?}"
        )))
    }
}

#[then("no virtual machine is destroyed")]
fn nothing_destroyed(deploy_context: &DeployContext) -> Result<(), StepError> {
    let calls = deploy_context.plane.destroy_calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no destroy calls, got {calls:?}"
        )))
    }
}

#[then("no virtual machine is deployed")]
fn nothing_deployed(deploy_context: &DeployContext) -> Result<(), StepError> {
    if deploy_context.plane.deploy_calls().is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "deploy should not be invoked",
        )))
    }
}

#[then("a manual destroy warning is reported")]
fn manual_destroy_warning(deploy_context: &DeployContext) -> Result<(), StepError> {
    let warnings = deploy_context.ui.warnings();
    let expected = format!("virtual machine {VM_ID}");
    if warnings
        .iter()
        .any(|warning| warning.contains(&expected) && warning.ends_with("destroy it manually"))
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a manual destroy warning for {VM_ID}, got {warnings:?}"
        )))
    }
}
