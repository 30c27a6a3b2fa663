//! BDD scenarios for the deploy step.

use rstest_bdd_macros::scenario;

use super::test_helpers::{
    DeployContext, DeployContextResult, deploy_context, deploy_context_result,
};

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Deploy a virtual machine and destroy it on unwind"
)]
fn scenario_deploy_and_destroy(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Render user data with the HTTP callback address"
)]
fn scenario_render_user_data(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Tear down a machine whose deploy job failed"
)]
fn scenario_deploy_job_failure(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Tear down a machine whose deploy job timed out"
)]
fn scenario_deploy_job_timeout(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Nothing to destroy when the deploy call fails"
)]
fn scenario_deploy_call_failure(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Abort on an unknown network before deploying"
)]
fn scenario_unknown_network(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Report destroy failures without raising"
)]
fn scenario_destroy_failure(
    deploy_context_result: DeployContextResult,
    deploy_context: DeployContext,
) {
    drop(deploy_context);
    drop(deploy_context_result);
}
