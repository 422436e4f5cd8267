//! Temporary SSH credential step for the key-based path.

use camino::Utf8PathBuf;
use tracing::warn;

use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};
use crate::comms::runner::{CommandRunner, ProcessCommandRunner};
use crate::keys::{KeyMaterial, TemporaryKey};

/// Prepares key material and registers the public half with the provider.
///
/// When an operator supplies a private key file it is used as-is; otherwise
/// a throwaway pair is generated. Cleanup deregisters the provider key and
/// removes generated material, both best-effort.
pub struct CreateSshKey {
    private_key_file: Option<Utf8PathBuf>,
    runner: Box<dyn CommandRunner>,
}

impl CreateSshKey {
    /// Creates the step, generating keys through the real process runner.
    #[must_use]
    pub fn new(private_key_file: Option<Utf8PathBuf>) -> Self {
        Self::with_runner(private_key_file, Box::new(ProcessCommandRunner))
    }

    /// Creates the step with a caller-supplied command runner.
    #[must_use]
    pub fn with_runner(
        private_key_file: Option<Utf8PathBuf>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            private_key_file,
            runner,
        }
    }
}

impl Step for CreateSshKey {
    fn name(&self) -> &'static str {
        "create_ssh_key"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            state.ui().say("Preparing temporary SSH credentials...");

            let prepared = match &self.private_key_file {
                Some(path) => KeyMaterial::load(path),
                None => KeyMaterial::generate(self.runner.as_ref()),
            };
            let material = match prepared {
                Ok(material) => material,
                Err(err) => return state.fail(err.into()),
            };

            let label = format!("kiln: {}", state.profile().instance_name);
            let registered = state
                .client()
                .register_ssh_key(&label, &material.public_key)
                .await;
            match registered {
                Ok(provider_id) => {
                    state.set_ssh_key(TemporaryKey {
                        provider_id,
                        material,
                    });
                    StepOutcome::Continue
                }
                Err(err) => {
                    material.remove_generated();
                    state.fail(err.into())
                }
            }
        })
    }

    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async move {
            let Some(key) = state.ssh_key_opt() else {
                return;
            };
            let provider_id = key.provider_id.clone();
            let material = key.material.clone();

            let deleted = state.client().delete_ssh_key(&provider_id).await;
            if let Err(err) = deleted {
                warn!(key_id = %provider_id, error = %err, "failed to deregister temporary key");
            }
            material.remove_generated();
        })
    }
}
