//! Core library for the kiln image bake tool.
//!
//! kiln provisions a virtual guest at a SoftLayer-style cloud provider,
//! waits for it to become reachable, runs user provisioning over the
//! configured communicator, and captures the guest's disk as a reusable
//! image template. The orchestration core is a sequential step state
//! machine: each step reads and writes shared build state, any halt or
//! cancellation unwinds the steps that ran in reverse order, and the final
//! state yields either an [`Artifact`] or the first fatal error.

pub mod build;
pub mod client;
pub mod comms;
pub mod config;
pub mod hook;
pub mod keys;
pub mod softlayer;
pub mod test_support;
pub mod ui;

pub use build::{
    Artifact, BuildError, BuildOutcome, BuildState, BuildStep, Builder, CancelToken, StateError,
    Step, StepOutcome, StepRunner, select_sequence,
};
pub use client::{
    BaseImage, ClientError, ImageId, InstanceAddresses, InstanceId, InstanceSpec, InstanceStatus,
    ProviderClient, Sizing, SshKeyId,
};
pub use comms::{Communicator, CommunicatorKind, Connection, Credentials, SshSettings, WinRmSettings};
pub use config::{BuildConfig, BuildProfile, ConfigError};
pub use hook::{NoopHook, ProvisionHook, ShellHook};
pub use keys::{KeyMaterial, TemporaryKey};
pub use softlayer::SoftLayerClient;
pub use ui::{Ui, WriterUi};
