//! Typed run state shared by the steps of one pipeline run, and the
//! operator-facing message sink.

use tracing::{error, info, warn};

/// Decision returned by a step's `run`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop the pipeline and start unwinding.
    Halt,
}

/// Values threaded through the steps of one run.
///
/// Each field has exactly one producer. Inputs are set before the deploy
/// step runs; outputs are written by the step and read by later steps.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunState {
    /// Name of the SSH key pair registered with the control plane.
    pub ssh_key_name: String,
    /// Address of the local callback server, if one is running.
    pub http_ip: Option<String>,
    /// Port of the local callback server, if one is running.
    pub http_port: Option<u16>,
    /// Rendered user data; written by the deploy step.
    pub user_data: Option<String>,
    /// Identifier of the created virtual machine; written only once its
    /// deploy job has completed.
    pub virtual_machine_id: Option<String>,
    /// Message of the error that halted the run.
    pub error: Option<String>,
}

impl RunState {
    /// Creates state for a run that authenticates with `ssh_key_name`.
    #[must_use]
    pub fn new(ssh_key_name: impl Into<String>) -> Self {
        Self {
            ssh_key_name: ssh_key_name.into(),
            ..Self::default()
        }
    }

    /// Records the local callback server address.
    #[must_use]
    pub fn with_callback(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.http_ip = Some(ip.into());
        self.http_port = Some(port);
        self
    }
}

/// Sink for operator-facing messages.
pub trait Ui: Send + Sync {
    /// Reports progress.
    fn say(&self, message: &str);

    /// Reports a problem that does not stop the run.
    fn warn(&self, message: &str);

    /// Reports the error that halted a step.
    fn error(&self, message: &str);
}

/// [`Ui`] that forwards operator messages as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        info!(target: "cloudstack_deploy::ui", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "cloudstack_deploy::ui", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "cloudstack_deploy::ui", "{message}");
    }
}
