//! Build orchestration: sequence selection and the builder façade.
//!
//! A build wires the shared state, selects the step sequence for the
//! profile's communicator, runs the sequence, and turns the final state
//! into either an [`Artifact`] or the first fatal error.

pub mod artifact;
pub mod error;
pub mod runner;
pub mod state;
pub mod step;
pub mod steps;

use std::sync::Arc;

use crate::client::ProviderClient;
use crate::comms::Communicator;
use crate::config::BuildProfile;
use crate::hook::ProvisionHook;
use crate::ui::Ui;

pub use artifact::Artifact;
pub use error::BuildError;
pub use runner::{BuildOutcome, CancelToken, StepRunner};
pub use state::{BuildState, StateError};
pub use step::{BuildStep, Step, StepFuture, StepOutcome};

use steps::{
    CaptureImage, Connect, CreateInstance, CreateSshKey, GrabPublicIp, Provision, WaitForInstance,
};

/// Selects the fixed step sequence for a profile's communicator.
///
/// The key-based path provisions temporary credentials first; the
/// password-based path waits for the instance a second time after
/// connecting because the provider reports readiness before the WinRM
/// listener is actually reachable.
#[must_use]
pub fn select_sequence(profile: &BuildProfile) -> Vec<BuildStep> {
    match &profile.communicator {
        Communicator::Ssh(settings) => vec![
            BuildStep::CreateSshKey(CreateSshKey::new(settings.private_key_file.clone())),
            BuildStep::CreateInstance(CreateInstance),
            BuildStep::WaitForInstance(WaitForInstance),
            BuildStep::GrabPublicIp(GrabPublicIp),
            BuildStep::Connect(Connect),
            BuildStep::Provision(Provision),
            BuildStep::CaptureImage(CaptureImage),
        ],
        Communicator::WinRm(_) => vec![
            BuildStep::CreateInstance(CreateInstance),
            BuildStep::WaitForInstance(WaitForInstance),
            BuildStep::GrabPublicIp(GrabPublicIp),
            BuildStep::Connect(Connect),
            BuildStep::WaitForInstance(WaitForInstance),
            BuildStep::Provision(Provision),
            BuildStep::CaptureImage(CaptureImage),
        ],
    }
}

/// Runs image builds for one resolved profile.
pub struct Builder {
    profile: BuildProfile,
    client: Arc<dyn ProviderClient>,
    ui: Arc<dyn Ui>,
    hook: Arc<dyn ProvisionHook>,
}

impl Builder {
    /// Wires a builder from its collaborators.
    #[must_use]
    pub fn new(
        profile: BuildProfile,
        client: Arc<dyn ProviderClient>,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn ProvisionHook>,
    ) -> Self {
        Self {
            profile,
            client,
            ui,
            hook,
        }
    }

    /// Executes one end-to-end build.
    ///
    /// The step sequence runs strictly sequentially; on halt or
    /// cancellation every step that ran is cleaned up in reverse order
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns the first fatal cause recorded by a step, or
    /// [`BuildError::Cancelled`] when the token stopped the sequence.
    ///
    /// # Panics
    ///
    /// Panics when the sequence finishes with neither an error nor a
    /// captured image. That state is unreachable through the fixed
    /// sequences and indicates a step-sequence bug, so it fails loudly
    /// rather than surfacing as a normal error.
    pub async fn run(&self, cancel: CancelToken) -> Result<Artifact, BuildError> {
        let steps = select_sequence(&self.profile);
        let mut build_runner = StepRunner::new(steps, cancel);
        let mut build_state = BuildState::new(
            self.profile.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.ui),
            Arc::clone(&self.hook),
        );

        let outcome = build_runner.run(&mut build_state).await;

        if let Some(error) = build_state.take_error() {
            return Err(error);
        }
        if outcome == BuildOutcome::Cancelled {
            return Err(BuildError::Cancelled);
        }

        let image_id = build_state
            .image_id()
            .cloned()
            .unwrap_or_else(|| panic!("build finished without an error or an image id"));

        Ok(Artifact::new(
            self.profile.image_name.clone(),
            image_id,
            self.profile.datacenter_name.clone(),
            Arc::clone(&self.client),
        ))
    }
}

#[cfg(test)]
mod tests;
