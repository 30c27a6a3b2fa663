//! Contract for the remote CloudStack control plane.
//!
//! The deploy step never speaks HTTP itself. It drives a [`ControlPlane`]
//! implementation for name lookups, deploy and destroy calls, and async job
//! status queries. Response payloads mirror the JSON envelopes CloudStack
//! returns so clients can deserialize them directly.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource types the deploy step resolves from names to identifiers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    /// Compute offering (CPU and memory sizing).
    ServiceOffering,
    /// Root or data disk offering.
    DiskOffering,
    /// Availability zone.
    Zone,
    /// Boot template.
    Template,
    /// Guest network.
    Network,
}

impl ResourceKind {
    /// Name CloudStack uses for the resource type in list calls.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::ServiceOffering => "ServiceOffering",
            Self::DiskOffering => "DiskOffering",
            Self::Zone => "Zone",
            Self::Template => "Template",
            Self::Network => "Network",
        }
    }

    /// Lower-case label used in operator-facing messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ServiceOffering => "service offering",
            Self::DiskOffering => "disk offering",
            Self::Zone => "zone",
            Self::Template => "template",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Key/value filters sent alongside a name lookup to disambiguate it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LookupFilters(BTreeMap<String, String>);

impl LookupFilters {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, replacing any previous value for the key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over filters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Fully resolved parameters for a `deployVirtualMachine` call.
///
/// Field names serialize to the CloudStack query parameter names.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DeployParams {
    /// Service offering identifier.
    #[serde(rename = "serviceofferingid")]
    pub service_offering_id: String,
    /// Template identifier.
    #[serde(rename = "templateid")]
    pub template_id: String,
    /// Zone identifier.
    #[serde(rename = "zoneid")]
    pub zone_id: String,
    /// Disk offering identifier; empty when none was requested.
    #[serde(rename = "diskofferingid")]
    pub disk_offering_id: String,
    /// Temporary display name for the new virtual machine.
    #[serde(rename = "displayname")]
    pub display_name: String,
    /// Network identifiers in request order.
    #[serde(rename = "networkids")]
    pub network_ids: Vec<String>,
    /// Name of the SSH key pair registered with the control plane.
    #[serde(rename = "keypair")]
    pub keypair: String,
    /// Rendered user data handed to the guest on first boot.
    #[serde(rename = "userdata")]
    pub user_data: String,
    /// Hypervisor tag (for example `KVM` or `XenServer`).
    pub hypervisor: String,
}

/// Opaque handle for an in-flight remote operation.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps a job identifier returned by the control plane.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope returned by `deployVirtualMachine`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DeployVirtualMachineResponse {
    /// Response body.
    #[serde(rename = "deployvirtualmachineresponse")]
    pub body: DeployedVirtualMachine,
}

/// Identifier and job handle for a freshly requested virtual machine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DeployedVirtualMachine {
    /// Virtual machine identifier.
    pub id: String,
    /// Async job tracking the deployment.
    #[serde(rename = "jobid")]
    pub job_id: JobId,
}

impl DeployVirtualMachineResponse {
    /// Builds a response from its parts.
    #[must_use]
    pub fn new(id: impl Into<String>, job_id: JobId) -> Self {
        Self {
            body: DeployedVirtualMachine {
                id: id.into(),
                job_id,
            },
        }
    }

    /// Splits the response into the virtual machine id and the job handle.
    #[must_use]
    pub fn into_parts(self) -> (String, JobId) {
        (self.body.id, self.body.job_id)
    }
}

/// Envelope returned by `destroyVirtualMachine`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DestroyVirtualMachineResponse {
    /// Response body.
    #[serde(rename = "destroyvirtualmachineresponse")]
    pub body: DestroyJob,
}

/// Job handle for a destroy request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DestroyJob {
    /// Async job tracking the destruction.
    #[serde(rename = "jobid")]
    pub job_id: JobId,
}

impl DestroyVirtualMachineResponse {
    /// Builds a response around a job handle.
    #[must_use]
    pub const fn new(job_id: JobId) -> Self {
        Self {
            body: DestroyJob { job_id },
        }
    }

    /// Consumes the response and returns the job handle.
    #[must_use]
    pub fn into_job_id(self) -> JobId {
        self.body.job_id
    }
}

/// Raised when a job status code is outside CloudStack's `0..=2` range.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("unknown async job status code {0}")]
pub struct UnknownJobStatus(pub u8);

/// Remote state of an async job.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "u8")]
pub enum JobStatus {
    /// The job is still running (`0`).
    Pending,
    /// The job finished successfully (`1`).
    Succeeded,
    /// The job finished with an error (`2`).
    Failed,
}

impl JobStatus {
    /// Returns `true` once the job left the in-progress state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = UnknownJobStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Succeeded),
            2 => Ok(Self::Failed),
            other => Err(UnknownJobStatus(other)),
        }
    }
}

/// Envelope returned by `queryAsyncJobResult`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct QueryAsyncJobResultResponse {
    /// Response body.
    #[serde(rename = "queryasyncjobresultresponse")]
    pub body: AsyncJobResult,
}

/// Snapshot of an async job as reported by the control plane.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AsyncJobResult {
    /// Job identifier.
    #[serde(rename = "jobid")]
    pub job_id: JobId,
    /// Current status.
    #[serde(rename = "jobstatus")]
    pub status: JobStatus,
    /// Result code; non-zero for failed jobs.
    #[serde(rename = "jobresultcode", default)]
    pub result_code: i64,
    /// Job specific result payload.
    #[serde(rename = "jobresult", default)]
    pub result: Option<serde_json::Value>,
}

impl AsyncJobResult {
    /// Builds a result without a payload.
    #[must_use]
    pub const fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            result_code: 0,
            result: None,
        }
    }

    /// Builds a failed result carrying CloudStack's `errortext`.
    #[must_use]
    pub fn failed(job_id: JobId, result_code: i64, error_text: &str) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            result_code,
            result: Some(serde_json::json!({ "errortext": error_text })),
        }
    }

    /// Returns the `errortext` reported for a failed job, if any.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.get("errortext"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Future returned by control-plane operations.
pub type ControlPlaneFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Operations the deploy step needs from a CloudStack client.
pub trait ControlPlane {
    /// Client specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves a display name to an identifier. Ambiguous or unknown names
    /// are errors.
    fn resolve_name_to_id<'a>(
        &'a self,
        name: &'a str,
        kind: ResourceKind,
        filters: &'a LookupFilters,
    ) -> ControlPlaneFuture<'a, String, Self::Error>;

    /// Requests a new virtual machine.
    fn deploy_virtual_machine<'a>(
        &'a self,
        params: &'a DeployParams,
    ) -> ControlPlaneFuture<'a, DeployVirtualMachineResponse, Self::Error>;

    /// Requests destruction of a virtual machine.
    fn destroy_virtual_machine<'a>(
        &'a self,
        id: &'a str,
    ) -> ControlPlaneFuture<'a, DestroyVirtualMachineResponse, Self::Error>;

    /// Reads the current status of an async job.
    fn query_async_job<'a>(
        &'a self,
        job_id: &'a JobId,
    ) -> ControlPlaneFuture<'a, AsyncJobResult, Self::Error>;
}
