//! Image capture step.

use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};

/// Captures the guest's disk state as a reusable image template.
///
/// Capture is the terminal productive action: there is nothing to undo on
/// failure beyond the instance cleanup the create step already owns, so
/// this step has no cleanup of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureImage;

impl Step for CaptureImage {
    fn name(&self) -> &'static str {
        "capture_image"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            let looked_up = state.instance_id().cloned();
            let instance_id = match looked_up {
                Ok(id) => id,
                Err(err) => return state.fail(err.into()),
            };
            let image_name = state.profile().image_name.clone();
            let description = state.profile().image_description.clone();

            state
                .ui()
                .say(&format!("Capturing image {image_name}..."));

            let captured = state
                .client()
                .capture_image(&instance_id, &image_name, &description)
                .await;
            match captured {
                Ok(image_id) => {
                    state.ui().say(&format!("Created image {image_id}"));
                    state.set_image_id(image_id);
                    StepOutcome::Continue
                }
                Err(err) => state.fail(err.into()),
            }
        })
    }

    fn cleanup<'a>(&'a mut self, _state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async {})
    }
}
