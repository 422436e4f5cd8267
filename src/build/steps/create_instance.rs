//! Instance creation step.

use tracing::warn;

use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};
use crate::client::InstanceSpec;
use crate::config::BuildProfile;
use crate::keys::TemporaryKey;

/// Creates the build guest from the profile's sizing and image selectors.
///
/// Cleanup deletes the guest unless the build succeeded: on success the
/// captured image is the artifact and the source guest is left to the
/// operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateInstance;

/// Builds the provider instance spec for a profile.
///
/// The temporary key, when present, is injected so the guest boots with
/// the build's public key authorised.
#[must_use]
pub fn instance_spec(profile: &BuildProfile, key: Option<&TemporaryKey>) -> InstanceSpec {
    InstanceSpec {
        hostname: profile.instance_name.clone(),
        domain: profile.instance_domain.clone(),
        datacenter: profile.datacenter_name.clone(),
        sizing: profile.sizing.clone(),
        base_image: profile.base_image.clone(),
        network_speed: profile.network_speed,
        public_vlan_id: profile.public_vlan_id,
        security_group_ids: profile.security_group_ids.clone(),
        local_disk: profile.local_disk,
        ssh_key_ids: key
            .map(|key| vec![key.provider_id.clone()])
            .unwrap_or_default(),
    }
}

impl Step for CreateInstance {
    fn name(&self) -> &'static str {
        "create_instance"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            let spec = instance_spec(state.profile(), state.ssh_key_opt());
            state
                .ui()
                .say(&format!("Creating instance {}...", spec.hostname));

            let created = state.client().create_instance(&spec).await;
            match created {
                Ok(id) => {
                    state.ui().say(&format!("Created instance {id}"));
                    state.set_instance_id(id);
                    StepOutcome::Continue
                }
                Err(err) => state.fail(err.into()),
            }
        })
    }

    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async move {
            if state.succeeded() {
                return;
            }
            let Some(created) = state.instance_id_opt() else {
                return;
            };
            let instance_id = created.clone();

            state.ui().say("Destroying build instance...");
            let deleted = state.client().delete_instance(&instance_id).await;
            if let Err(err) = deleted {
                warn!(instance_id = %instance_id, error = %err, "failed to delete build instance");
            }
        })
    }
}
