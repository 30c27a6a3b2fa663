//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::control_plane::{
    AsyncJobResult, ControlPlane, ControlPlaneFuture, DeployParams, DeployVirtualMachineResponse,
    DestroyVirtualMachineResponse, JobId, JobStatus, LookupFilters, ResourceKind,
};
use crate::state::Ui;

/// Virtual machine id returned by [`ScriptedControlPlane`] unless overridden.
pub const SCRIPTED_VM_ID: &str = "scripted-vm";
/// Deploy job handle returned by [`ScriptedControlPlane`] unless overridden.
pub const SCRIPTED_DEPLOY_JOB: &str = "scripted-deploy-job";
/// Destroy job handle returned by [`ScriptedControlPlane`].
pub const SCRIPTED_DESTROY_JOB: &str = "scripted-destroy-job";

/// A name lookup recorded by [`ScriptedControlPlane`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lookup {
    /// Name passed to the lookup.
    pub name: String,
    /// Resource kind being resolved.
    pub kind: ResourceKind,
    /// Filters passed alongside the name.
    pub filters: LookupFilters,
}

/// Errors produced by [`ScriptedControlPlane`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedControlPlaneError {
    /// Raised when a name was not registered.
    #[error("no {kind} named '{name}'")]
    UnknownResource {
        /// Resource kind being resolved.
        kind: ResourceKind,
        /// Name that was not found.
        name: String,
    },
    /// Raised when deploy failure was scripted.
    #[error("deploy failure")]
    Deploy,
    /// Raised when destroy failure was scripted.
    #[error("destroy failure")]
    Destroy,
    /// Raised when job query failure was scripted.
    #[error("job query failure")]
    Query,
}

#[derive(Debug)]
struct State {
    ids: HashMap<(ResourceKind, String), String>,
    lookups: Vec<Lookup>,
    deploy_response: (String, JobId),
    deploy_calls: Vec<DeployParams>,
    fail_deploy: bool,
    destroy_calls: Vec<String>,
    fail_destroy: bool,
    jobs: HashMap<JobId, VecDeque<AsyncJobResult>>,
    job_queries: Vec<JobId>,
    fail_job_queries: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            lookups: Vec::new(),
            deploy_response: (SCRIPTED_VM_ID.to_owned(), JobId::new(SCRIPTED_DEPLOY_JOB)),
            deploy_calls: Vec::new(),
            fail_deploy: false,
            destroy_calls: Vec::new(),
            fail_destroy: false,
            jobs: HashMap::new(),
            job_queries: Vec::new(),
            fail_job_queries: false,
        }
    }
}

/// Scripted control plane that records every call.
///
/// Names resolve only when registered with [`Self::register`]. Jobs without
/// a script succeed on the first query; a scripted job replays its results
/// in order and keeps returning the last one.
#[derive(Clone, Debug, Default)]
pub struct ScriptedControlPlane {
    state: Arc<Mutex<State>>,
}

impl ScriptedControlPlane {
    /// Creates a control plane with no registered names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `name` as resolving to `id` for `kind`.
    #[must_use]
    pub fn register(self, kind: ResourceKind, name: &str, id: &str) -> Self {
        self.state()
            .ids
            .insert((kind, name.to_owned()), id.to_owned());
        self
    }

    /// Overrides the id and job handle returned by deploy calls.
    pub fn set_deploy_response(&self, id: &str, job_id: &str) {
        self.state().deploy_response = (id.to_owned(), JobId::new(job_id));
    }

    /// Makes every deploy call fail.
    pub fn fail_deploy(&self) {
        self.state().fail_deploy = true;
    }

    /// Makes every destroy call fail.
    pub fn fail_destroy(&self) {
        self.state().fail_destroy = true;
    }

    /// Makes every job status query fail.
    pub fn fail_job_queries(&self) {
        self.state().fail_job_queries = true;
    }

    /// Scripts the statuses reported for `job_id`.
    pub fn script_job<I>(&self, job_id: &JobId, statuses: I)
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let results = statuses
            .into_iter()
            .map(|status| AsyncJobResult::new(job_id.clone(), status))
            .collect();
        self.state().jobs.insert(job_id.clone(), results);
    }

    /// Scripts `job_id` to fail with the given code and error text.
    pub fn fail_job(&self, job_id: &JobId, code: i64, error_text: &str) {
        let result = AsyncJobResult::failed(job_id.clone(), code, error_text);
        self.state()
            .jobs
            .insert(job_id.clone(), VecDeque::from([result]));
    }

    /// Returns every recorded lookup in call order.
    #[must_use]
    pub fn lookups(&self) -> Vec<Lookup> {
        self.state().lookups.clone()
    }

    /// Returns every recorded deploy call.
    #[must_use]
    pub fn deploy_calls(&self) -> Vec<DeployParams> {
        self.state().deploy_calls.clone()
    }

    /// Returns the ids passed to destroy calls.
    #[must_use]
    pub fn destroy_calls(&self) -> Vec<String> {
        self.state().destroy_calls.clone()
    }

    /// Returns every queried job handle in call order.
    #[must_use]
    pub fn job_queries(&self) -> Vec<JobId> {
        self.state().job_queries.clone()
    }
}

impl ControlPlane for ScriptedControlPlane {
    type Error = ScriptedControlPlaneError;

    fn resolve_name_to_id<'a>(
        &'a self,
        name: &'a str,
        kind: ResourceKind,
        filters: &'a LookupFilters,
    ) -> ControlPlaneFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.lookups.push(Lookup {
                name: name.to_owned(),
                kind,
                filters: filters.clone(),
            });
            state.ids.get(&(kind, name.to_owned())).cloned().ok_or_else(|| {
                ScriptedControlPlaneError::UnknownResource {
                    kind,
                    name: name.to_owned(),
                }
            })
        })
    }

    fn deploy_virtual_machine<'a>(
        &'a self,
        params: &'a DeployParams,
    ) -> ControlPlaneFuture<'a, DeployVirtualMachineResponse, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.deploy_calls.push(params.clone());
            if state.fail_deploy {
                return Err(ScriptedControlPlaneError::Deploy);
            }
            let (id, job_id) = state.deploy_response.clone();
            Ok(DeployVirtualMachineResponse::new(id, job_id))
        })
    }

    fn destroy_virtual_machine<'a>(
        &'a self,
        id: &'a str,
    ) -> ControlPlaneFuture<'a, DestroyVirtualMachineResponse, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.destroy_calls.push(id.to_owned());
            if state.fail_destroy {
                return Err(ScriptedControlPlaneError::Destroy);
            }
            Ok(DestroyVirtualMachineResponse::new(JobId::new(
                SCRIPTED_DESTROY_JOB,
            )))
        })
    }

    fn query_async_job<'a>(
        &'a self,
        job_id: &'a JobId,
    ) -> ControlPlaneFuture<'a, AsyncJobResult, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.job_queries.push(job_id.clone());
            if state.fail_job_queries {
                return Err(ScriptedControlPlaneError::Query);
            }
            let Some(script) = state.jobs.get_mut(job_id) else {
                return Ok(AsyncJobResult::new(job_id.clone(), JobStatus::Succeeded));
            };
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            Ok(next.unwrap_or_else(|| AsyncJobResult::new(job_id.clone(), JobStatus::Succeeded)))
        })
    }
}

/// Severity of a message captured by [`RecordingUi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiMessage {
    /// Progress message.
    Say(String),
    /// Non-fatal warning.
    Warn(String),
    /// Error that halted a step.
    Error(String),
}

/// UI sink that keeps every message for later assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingUi {
    messages: Arc<Mutex<Vec<UiMessage>>>,
}

impl RecordingUi {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, message: UiMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Returns every captured message in order.
    #[must_use]
    pub fn messages(&self) -> Vec<UiMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the text of captured warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                UiMessage::Warn(text) => Some(text),
                UiMessage::Say(_) | UiMessage::Error(_) => None,
            })
            .collect()
    }

    /// Returns the text of captured errors.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                UiMessage::Error(text) => Some(text),
                UiMessage::Say(_) | UiMessage::Warn(_) => None,
            })
            .collect()
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.push(UiMessage::Say(message.to_owned()));
    }

    fn warn(&self, message: &str) {
        self.push(UiMessage::Warn(message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.push(UiMessage::Error(message.to_owned()));
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds [`ENV_LOCK`] and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets environment variables while holding [`ENV_LOCK`].
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
