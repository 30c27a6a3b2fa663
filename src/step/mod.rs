//! Step contract and the run-then-unwind sequencing around it.
//!
//! A [`StepSequence`] runs its steps in order until one halts or the run is
//! cancelled, then unwinds: every step whose `run` was entered gets its
//! `cleanup` called exactly once, in reverse order, whatever the outcome.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::{RunState, StepAction};

/// Future returned by step operations.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single unit of a pipeline run.
pub trait Step: Send {
    /// Short name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Performs the step's work.
    fn run<'a>(&'a mut self, state: &'a mut RunState) -> StepFuture<'a, StepAction>;

    /// Reverses the step's side effects while the run unwinds. Must not fail.
    fn cleanup<'a>(&'a mut self, state: &'a mut RunState) -> StepFuture<'a, ()>;
}

/// How a [`StepSequence`] finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SequenceOutcome {
    /// Every step returned [`StepAction::Continue`].
    Completed,
    /// The named step returned [`StepAction::Halt`].
    Halted {
        /// Name of the halting step.
        step: String,
    },
    /// The cancellation token fired between steps.
    Cancelled,
}

/// Ordered steps with guaranteed unwinding.
#[derive(Default)]
pub struct StepSequence<'s> {
    steps: Vec<Box<dyn Step + 's>>,
}

impl<'s> StepSequence<'s> {
    /// Creates an empty sequence.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: impl Step + 's) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Runs the steps and then unwinds them.
    ///
    /// Cancellation is checked only between steps, so a step that is
    /// waiting on the control plane finishes (or times out) first.
    pub async fn run(
        mut self,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> SequenceOutcome {
        let mut entered = 0_usize;
        let mut outcome = SequenceOutcome::Completed;

        for step in &mut self.steps {
            if cancel.is_cancelled() {
                warn!(step = step.name(), "run cancelled before step");
                if state.error.is_none() {
                    state.error = Some(String::from("run cancelled"));
                }
                outcome = SequenceOutcome::Cancelled;
                break;
            }

            entered += 1;
            info!(step = step.name(), "running step");
            if step.run(state).await == StepAction::Halt {
                outcome = SequenceOutcome::Halted {
                    step: step.name().to_owned(),
                };
                break;
            }
        }

        for step in self.steps.iter_mut().take(entered).rev() {
            info!(step = step.name(), "cleaning up step");
            step.cleanup(state).await;
        }

        outcome
    }
}
