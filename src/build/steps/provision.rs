//! User provisioning step.

use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};

/// Hands the established connection to the injected provisioning hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct Provision;

impl Step for Provision {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            let looked_up = state.connection().cloned();
            let connection = match looked_up {
                Ok(connection) => connection,
                Err(err) => return state.fail(err.into()),
            };

            state.ui().say("Provisioning the instance...");
            let provisioned = state.hook().provision(&connection, state.ui()).await;
            match provisioned {
                Ok(()) => StepOutcome::Continue,
                Err(err) => state.fail(err.into()),
            }
        })
    }

    fn cleanup<'a>(&'a mut self, _state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async {})
    }
}
