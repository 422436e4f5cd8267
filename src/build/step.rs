//! Step abstraction and the closed set of build steps.
//!
//! A step is a unit of orchestration with a run phase and a cleanup phase.
//! The set of steps in a build is fixed, so dispatch is a closed enum
//! rather than an open registry; the [`Step`] trait exists as the seam the
//! runner is generic over, which also lets tests drive it with probe steps.

use std::future::Future;
use std::pin::Pin;

use crate::build::state::BuildState;
use crate::build::steps::{
    CaptureImage, Connect, CreateInstance, CreateSshKey, GrabPublicIp, Provision, WaitForInstance,
};

/// Future returned by step phases.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a step's run phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// Advance to the next step.
    Continue,
    /// Stop the sequence; the terminal cause is in the build state.
    Halt,
}

/// A unit of orchestration with run and cleanup phases.
///
/// Cleanup must be idempotent with respect to a run phase that never
/// executed: a step whose stage result is absent has nothing to undo and
/// must return without error.
pub trait Step {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Executes the step against the shared build state.
    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome>;

    /// Undoes the step's side effects, best-effort.
    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, ()>;
}

/// The closed set of steps a build sequence is made of.
pub enum BuildStep {
    /// Prepares and registers temporary SSH credentials.
    CreateSshKey(CreateSshKey),
    /// Creates the virtual guest.
    CreateInstance(CreateInstance),
    /// Waits for the guest to become active.
    WaitForInstance(WaitForInstance),
    /// Waits for and records the guest's public address.
    GrabPublicIp(GrabPublicIp),
    /// Establishes the communicator connection.
    Connect(Connect),
    /// Runs user provisioning through the injected hook.
    Provision(Provision),
    /// Captures the guest's disk as an image template.
    CaptureImage(CaptureImage),
}

impl Step for BuildStep {
    fn name(&self) -> &'static str {
        match self {
            Self::CreateSshKey(step) => step.name(),
            Self::CreateInstance(step) => step.name(),
            Self::WaitForInstance(step) => step.name(),
            Self::GrabPublicIp(step) => step.name(),
            Self::Connect(step) => step.name(),
            Self::Provision(step) => step.name(),
            Self::CaptureImage(step) => step.name(),
        }
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        match self {
            Self::CreateSshKey(step) => step.run(state),
            Self::CreateInstance(step) => step.run(state),
            Self::WaitForInstance(step) => step.run(state),
            Self::GrabPublicIp(step) => step.run(state),
            Self::Connect(step) => step.run(state),
            Self::Provision(step) => step.run(state),
            Self::CaptureImage(step) => step.run(state),
        }
    }

    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, ()> {
        match self {
            Self::CreateSshKey(step) => step.cleanup(state),
            Self::CreateInstance(step) => step.cleanup(state),
            Self::WaitForInstance(step) => step.cleanup(state),
            Self::GrabPublicIp(step) => step.cleanup(state),
            Self::Connect(step) => step.cleanup(state),
            Self::Provision(step) => step.cleanup(state),
            Self::CaptureImage(step) => step.cleanup(state),
        }
    }
}
