//! Shared build state threaded through the step sequence.
//!
//! The state is a typed bag of stage results rather than a stringly-keyed
//! map: each step writes the fields it owns and later steps read them
//! through accessors that fail loudly when a result is missing, so a
//! mis-ordered sequence surfaces immediately instead of propagating empty
//! values.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::build::error::BuildError;
use crate::build::step::StepOutcome;
use crate::client::{ImageId, InstanceId, ProviderClient};
use crate::comms::Connection;
use crate::config::BuildProfile;
use crate::hook::ProvisionHook;
use crate::keys::TemporaryKey;
use crate::ui::Ui;

/// Raised when a step reads a stage result that no earlier step produced.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("build state field `{field}` is not set yet")]
pub struct StateError {
    /// Name of the missing field.
    pub field: &'static str,
}

impl StateError {
    const fn not_yet_set(field: &'static str) -> Self {
        Self { field }
    }
}

/// Mutable state shared by the steps of one build.
///
/// Only the currently running step mutates the bag; the runner enforces
/// strictly sequential execution, so no interior locking is needed.
pub struct BuildState {
    profile: BuildProfile,
    client: Arc<dyn ProviderClient>,
    ui: Arc<dyn Ui>,
    hook: Arc<dyn ProvisionHook>,
    instance_id: Option<InstanceId>,
    public_ip: Option<IpAddr>,
    private_ip: Option<IpAddr>,
    ssh_key: Option<TemporaryKey>,
    connection: Option<Connection>,
    image_id: Option<ImageId>,
    error: Option<BuildError>,
}

impl BuildState {
    /// Creates the state for one build.
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
            instance_id: None,
            public_ip: None,
            private_ip: None,
            ssh_key: None,
            connection: None,
            image_id: None,
            error: None,
        }
    }

    /// Read-only build configuration.
    #[must_use]
    pub const fn profile(&self) -> &BuildProfile {
        &self.profile
    }

    /// Shared provider client handle.
    #[must_use]
    pub fn client(&self) -> &dyn ProviderClient {
        self.client.as_ref()
    }

    /// Operator-facing output sink.
    #[must_use]
    pub fn ui(&self) -> &dyn Ui {
        self.ui.as_ref()
    }

    /// Injected provisioning hook.
    #[must_use]
    pub fn hook(&self) -> &dyn ProvisionHook {
        self.hook.as_ref()
    }

    /// Identifier of the created instance.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] before the create step has run.
    pub fn instance_id(&self) -> Result<&InstanceId, StateError> {
        self.instance_id
            .as_ref()
            .ok_or(StateError::not_yet_set("instance_id"))
    }

    /// Records the created instance.
    pub fn set_instance_id(&mut self, id: InstanceId) {
        self.instance_id = Some(id);
    }

    /// Returns the instance id if the create step ran, without failing.
    ///
    /// Cleanup paths use this form: a missing id simply means there is
    /// nothing to delete.
    #[must_use]
    pub const fn instance_id_opt(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Public address of the instance.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] before the address step has run.
    pub fn public_ip(&self) -> Result<IpAddr, StateError> {
        self.public_ip.ok_or(StateError::not_yet_set("public_ip"))
    }

    /// Records the instance addresses.
    pub fn set_addresses(&mut self, public_ip: IpAddr, private_ip: Option<IpAddr>) {
        self.public_ip = Some(public_ip);
        self.private_ip = private_ip;
    }

    /// Private address of the instance, when the provider reported one.
    #[must_use]
    pub const fn private_ip(&self) -> Option<IpAddr> {
        self.private_ip
    }

    /// Temporary key registered for the key-based communicator.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] before the key step has run.
    pub fn ssh_key(&self) -> Result<&TemporaryKey, StateError> {
        self.ssh_key.as_ref().ok_or(StateError::not_yet_set("ssh_key"))
    }

    /// Records the temporary key.
    pub fn set_ssh_key(&mut self, key: TemporaryKey) {
        self.ssh_key = Some(key);
    }

    /// Temporary key, if the key step ran. Used by cleanup.
    #[must_use]
    pub const fn ssh_key_opt(&self) -> Option<&TemporaryKey> {
        self.ssh_key.as_ref()
    }

    /// Established communicator connection.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] before the connect step has run.
    pub fn connection(&self) -> Result<&Connection, StateError> {
        self.connection
            .as_ref()
            .ok_or(StateError::not_yet_set("connection"))
    }

    /// Records the established connection.
    pub fn set_connection(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }

    /// Identifier of the captured image, once capture has run.
    #[must_use]
    pub const fn image_id(&self) -> Option<&ImageId> {
        self.image_id.as_ref()
    }

    /// Records the captured image.
    pub fn set_image_id(&mut self, id: ImageId) {
        self.image_id = Some(id);
    }

    /// Records the build's terminal error and halts the sequence.
    ///
    /// The first error wins: later failures (typically from cleanup paths)
    /// never overwrite the original cause.
    pub fn fail(&mut self, error: BuildError) -> StepOutcome {
        self.ui.error(&error.to_string());
        if self.error.is_none() {
            self.error = Some(error);
        }
        StepOutcome::Halt
    }

    /// Returns `true` once a terminal error has been recorded.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Takes the terminal error out of the state.
    pub fn take_error(&mut self) -> Option<BuildError> {
        self.error.take()
    }

    /// Returns `true` when the build produced an image and hit no error.
    ///
    /// Cleanup decisions key off this: the instance is only deleted when
    /// the build did not succeed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none() && self.image_id.is_some()
    }
}
