//! Public address lookup step.

use std::time::Instant;

use tokio::time::sleep;
use tracing::debug;

use crate::build::error::BuildError;
use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};

/// Polls the provider until the guest has a public address.
///
/// Address assignment is asynchronous on some providers, so an active
/// guest may briefly have no address; the step polls with the same
/// deadline discipline as the readiness wait.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrabPublicIp;

impl Step for GrabPublicIp {
    fn name(&self) -> &'static str {
        "grab_public_ip"
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

            state.ui().say("Looking up the instance's public address...");

            let started = Instant::now();
            loop {
                let polled = state.client().addresses(&instance_id).await;
                match polled {
                    Ok(addresses) => {
                        if let Some(public) = addresses.public {
                            state
                                .ui()
                                .say(&format!("Instance reachable at {public}"));
                            state.set_addresses(public, addresses.private);
                            return StepOutcome::Continue;
                        }
                    }
                    Err(err) if err.is_transient() => {
                        debug!(instance_id = %instance_id, error = %err, "transient poll failure");
                    }
                    Err(err) => return state.fail(err.into()),
                }

                let waited = started.elapsed();
                if waited >= timeout {
                    return state.fail(BuildError::MissingAddress {
                        instance_id: instance_id.to_string(),
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
