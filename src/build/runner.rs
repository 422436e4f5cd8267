//! Sequential step runner with reverse-order cleanup.
//!
//! The runner advances through the sequence one step at a time, stops on
//! halt, cancellation, or a recorded error, and then unwinds by running
//! cleanup on every step that ran, in reverse order, no matter how the
//! sequence ended. Cleanup failures are the steps' own business: they log
//! and never escalate, so the original cause always survives the unwind.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::build::state::BuildState;
use crate::build::step::{Step, StepOutcome};

/// Cooperative cancellation signal shared between the caller and a build.
///
/// Cancellation is observed between steps only: a step blocked on a single
/// provider call finishes that call first. Stopping is therefore eventual,
/// not immediate, but accumulated cleanup always runs.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the cancellation signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal state of a completed run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildOutcome {
    /// Every step ran and no error was recorded.
    Succeeded,
    /// A step halted the sequence with a terminal error.
    Failed,
    /// Cancellation stopped the sequence before it completed.
    Cancelled,
}

/// Executes a step sequence against shared build state.
pub struct StepRunner<S: Step> {
    steps: Vec<S>,
    cancel: CancelToken,
}

impl<S: Step> StepRunner<S> {
    /// Creates a runner over `steps` observing `cancel`.
    #[must_use]
    pub fn new(steps: Vec<S>, cancel: CancelToken) -> Self {
        Self { steps, cancel }
    }

    /// Runs the sequence to completion and unwinds.
    ///
    /// Returns the terminal outcome; the terminal error, if any, stays in
    /// the build state for the caller to extract.
    pub async fn run(&mut self, state: &mut BuildState) -> BuildOutcome {
        let mut ran = Vec::with_capacity(self.steps.len());
        let mut cancelled = false;

        for index in 0..self.steps.len() {
            if self.cancel.is_cancelled() {
                debug!("cancellation observed; stopping before next step");
                cancelled = true;
                break;
            }
            // A step that records an error but returns Continue must not
            // let the sequence advance.
            if state.has_error() {
                break;
            }
            let Some(step) = self.steps.get_mut(index) else {
                break;
            };
            debug!(step = step.name(), "running step");
            ran.push(index);
            if step.run(state).await == StepOutcome::Halt {
                debug!(step = step.name(), "step halted the sequence");
                break;
            }
        }

        for index in ran.into_iter().rev() {
            if let Some(step) = self.steps.get_mut(index) {
                debug!(step = step.name(), "cleaning up step");
                step.cleanup(state).await;
            }
        }

        if state.has_error() {
            BuildOutcome::Failed
        } else if cancelled {
            BuildOutcome::Cancelled
        } else {
            BuildOutcome::Succeeded
        }
    }
}
