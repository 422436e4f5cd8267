//! Terminal error taxonomy for a build.
//!
//! Timeout variants are deliberately distinct from provider failures so an
//! operator can tell "the provider rejected the request" apart from "the
//! provider was too slow".

use std::time::Duration;

use thiserror::Error;

use crate::build::state::StateError;
use crate::client::ClientError;
use crate::hook::ProvisionError;
use crate::keys::KeyError;

/// First fatal cause of a failed build.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BuildError {
    /// The provider rejected an operation.
    #[error(transparent)]
    Provider(#[from] ClientError),
    /// The instance never reached the active state within the timeout.
    #[error("timeout after {} waiting for instance {instance_id} to become active", format_wait(.waited))]
    StateTimeout {
        /// Provider instance identifier.
        instance_id: String,
        /// How long the build waited.
        waited: Duration,
    },
    /// The provider reported the instance as failed.
    #[error("instance {instance_id} entered a failed state")]
    InstanceFailed {
        /// Provider instance identifier.
        instance_id: String,
    },
    /// No public address was assigned within the timeout.
    #[error("instance {instance_id} was never assigned a public address")]
    MissingAddress {
        /// Provider instance identifier.
        instance_id: String,
    },
    /// The communicator endpoint never became reachable.
    #[error("timed out connecting to {host}:{port}")]
    ConnectTimeout {
        /// Address the connect step probed.
        host: String,
        /// Port the connect step probed.
        port: u16,
    },
    /// Temporary key material could not be prepared or registered.
    #[error("failed to prepare temporary credentials: {0}")]
    Key(#[from] KeyError),
    /// The provisioning hook failed.
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    /// A step read a stage result that was never produced.
    #[error("step ordering bug: {0}")]
    State(#[from] StateError),
    /// The build was cancelled before completing.
    #[error("build cancelled")]
    Cancelled,
}

fn format_wait(waited: &Duration) -> String {
    let millis = waited.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else {
        format!("{}s", waited.as_secs())
    }
}
