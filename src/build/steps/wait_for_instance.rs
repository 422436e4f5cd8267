//! Instance readiness polling step.

use std::time::Instant;

use tokio::time::sleep;
use tracing::debug;

use crate::build::error::BuildError;
use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};
use crate::client::InstanceStatus;

/// Polls the provider until the guest reports active.
///
/// The winrm sequence runs this step twice: once before connecting and
/// once after, because the provider reports readiness before the WinRM
/// listener is actually reachable and the reboot that follows first
/// contact briefly drops the guest back to pending.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaitForInstance;

impl Step for WaitForInstance {
    fn name(&self) -> &'static str {
        "wait_for_instance"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            let looked_up = state.instance_id().cloned();
            let instance_id = match looked_up {
                Ok(id) => id,
                Err(err) => return state.fail(err.into()),
            };
            let timeout = state.profile().state_timeout;
            let interval = state.profile().poll_interval;

            state
                .ui()
                .say(&format!("Waiting for instance {instance_id} to become active..."));

            let started = Instant::now();
            loop {
                let polled = state.client().instance_status(&instance_id).await;
                match polled {
                    Ok(InstanceStatus::Active) => {
                        state.ui().say("Instance is active");
                        return StepOutcome::Continue;
                    }
                    Ok(InstanceStatus::Failed) => {
                        return state.fail(BuildError::InstanceFailed {
                            instance_id: instance_id.to_string(),
                        });
                    }
                    Ok(InstanceStatus::Pending) => {}
                    Err(err) if err.is_transient() => {
                        debug!(instance_id = %instance_id, error = %err, "transient poll failure");
                    }
                    Err(err) => return state.fail(err.into()),
                }

                let waited = started.elapsed();
                if waited >= timeout {
                    return state.fail(BuildError::StateTimeout {
                        instance_id: instance_id.to_string(),
                        waited,
                    });
                }
                sleep(interval.min(timeout.saturating_sub(waited))).await;
            }
        })
    }

    fn cleanup<'a>(&'a mut self, _state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async {})
    }
}
