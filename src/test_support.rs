//! Test support utilities shared across unit and integration tests.
//!
//! The scripted provider client drives deterministic build outcomes
//! without network access: statuses are served from a FIFO queue, failure
//! switches force permanent errors from individual operations, and every
//! call is counted so tests can assert exactly which provider operations a
//! build performed.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::build::runner::CancelToken;
use crate::client::{
    BaseImage, ClientError, ClientFuture, ImageId, InstanceAddresses, InstanceId, InstanceSpec,
    InstanceStatus, ProviderClient, Sizing, SshKeyId,
};
use crate::comms::{Communicator, Connection, DEFAULT_SSH_PORT, SshSettings, WinRmSettings};
use crate::config::BuildProfile;
use crate::hook::{HookFuture, NoopHook, ProvisionHook};
use crate::ui::Ui;

/// Number of times each provider operation was invoked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CallCounts {
    /// `create_instance` invocations.
    pub create_instance: u32,
    /// `instance_status` invocations.
    pub instance_status: u32,
    /// `addresses` invocations.
    pub addresses: u32,
    /// `capture_image` invocations.
    pub capture_image: u32,
    /// `delete_image` invocations.
    pub delete_image: u32,
    /// `delete_instance` invocations.
    pub delete_instance: u32,
    /// `register_ssh_key` invocations.
    pub register_ssh_key: u32,
    /// `delete_ssh_key` invocations.
    pub delete_ssh_key: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    counts: CallCounts,
    statuses: VecDeque<InstanceStatus>,
    status_errors: VecDeque<ClientError>,
    default_status: Option<InstanceStatus>,
    public_address: Option<IpAddr>,
    fail_on_create: Option<ClientError>,
    fail_on_capture: Option<ClientError>,
    cancel_after_create: Option<CancelToken>,
}

/// Scripted provider client for driving builds in tests.
#[derive(Clone, Debug, Default)]
pub struct FakeProviderClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProviderClient {
    /// Creates a fake that reports active immediately and assigns a
    /// loopback public address.
    #[must_use]
    pub fn happy_path() -> Self {
        let fake = Self::default();
        fake.set_default_status(InstanceStatus::Active);
        fake.set_public_address(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("fake client lock poisoned: {err}"))
    }

    /// Queues one status response; queued responses win over the default.
    pub fn push_status(&self, status: InstanceStatus) {
        self.lock().statuses.push_back(status);
    }

    /// Sets the status served once the queue is drained.
    pub fn set_default_status(&self, status: InstanceStatus) {
        self.lock().default_status = Some(status);
    }

    /// Queues an error response for the next status poll; queued errors
    /// are served before any queued status.
    pub fn push_status_error(&self, error: ClientError) {
        self.lock().status_errors.push_back(error);
    }

    /// Sets the public address reported for the instance.
    pub fn set_public_address(&self, address: Option<IpAddr>) {
        self.lock().public_address = address;
    }

    /// Forces `create_instance` to fail with `error`.
    pub fn fail_on_create(&self, error: ClientError) {
        self.lock().fail_on_create = Some(error);
    }

    /// Forces `capture_image` to fail with `error`.
    pub fn fail_on_capture(&self, error: ClientError) {
        self.lock().fail_on_capture = Some(error);
    }

    /// Raises `token` as soon as `create_instance` completes, emulating an
    /// operator cancelling mid-sequence.
    pub fn cancel_after_create(&self, token: CancelToken) {
        self.lock().cancel_after_create = Some(token);
    }

    /// Returns a snapshot of the per-operation call counts.
    #[must_use]
    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }
}

impl ProviderClient for FakeProviderClient {
    fn create_instance<'a>(&'a self, _spec: &'a InstanceSpec) -> ClientFuture<'a, InstanceId> {
        Box::pin(async move {
            let mut state = self.lock();
            state.counts.create_instance += 1;
            if let Some(err) = state.fail_on_create.clone() {
                return Err(err);
            }
            if let Some(token) = &state.cancel_after_create {
                token.cancel();
            }
            Ok(InstanceId::new("instance-1"))
        })
    }

    fn instance_status<'a>(&'a self, _id: &'a InstanceId) -> ClientFuture<'a, InstanceStatus> {
        Box::pin(async move {
            let mut state = self.lock();
            state.counts.instance_status += 1;
            if let Some(err) = state.status_errors.pop_front() {
                return Err(err);
            }
            let status = state
                .statuses
                .pop_front()
                .or(state.default_status)
                .unwrap_or(InstanceStatus::Pending);
            Ok(status)
        })
    }

    fn addresses<'a>(&'a self, _id: &'a InstanceId) -> ClientFuture<'a, InstanceAddresses> {
        Box::pin(async move {
            let mut state = self.lock();
            state.counts.addresses += 1;
            Ok(InstanceAddresses {
                public: state.public_address,
                private: None,
            })
        })
    }

    fn capture_image<'a>(
        &'a self,
        _id: &'a InstanceId,
        _name: &'a str,
        _description: &'a str,
    ) -> ClientFuture<'a, ImageId> {
        Box::pin(async move {
            let mut state = self.lock();
            state.counts.capture_image += 1;
            if let Some(err) = state.fail_on_capture.clone() {
                return Err(err);
            }
            Ok(ImageId::new("image-1"))
        })
    }

    fn delete_image<'a>(&'a self, _id: &'a ImageId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.lock().counts.delete_image += 1;
            Ok(())
        })
    }

    fn delete_instance<'a>(&'a self, _id: &'a InstanceId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.lock().counts.delete_instance += 1;
            Ok(())
        })
    }

    fn register_ssh_key<'a>(
        &'a self,
        _label: &'a str,
        _public_key: &'a str,
    ) -> ClientFuture<'a, SshKeyId> {
        Box::pin(async move {
            self.lock().counts.register_ssh_key += 1;
            Ok(SshKeyId::new("key-1"))
        })
    }

    fn delete_ssh_key<'a>(&'a self, _id: &'a SshKeyId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.lock().counts.delete_ssh_key += 1;
            Ok(())
        })
    }
}

/// [`Ui`] double that records everything said to it.
#[derive(Clone, Debug, Default)]
pub struct RecordingUi {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingUi {
    /// Returns every recorded line, progress and errors alike.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map_or_else(|_| Vec::new(), |lines| lines.clone())
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_owned());
        }
    }

    fn error(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("error: {message}"));
        }
    }
}

/// Hook double counting how many times provisioning ran.
#[derive(Clone, Debug, Default)]
pub struct CountingHook {
    calls: Arc<Mutex<u32>>,
}

impl CountingHook {
    /// Number of completed provision invocations.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.lock().map_or(0, |calls| *calls)
    }
}

impl ProvisionHook for CountingHook {
    fn provision<'a>(&'a self, _connection: &'a Connection, _ui: &'a dyn Ui) -> HookFuture<'a> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            Ok(())
        })
    }
}

/// A no-op hook behind the trait-object type the build state expects.
#[must_use]
pub fn noop_hook() -> Arc<dyn ProvisionHook> {
    Arc::new(NoopHook)
}

/// Profile for the key-based path with test-friendly timeouts.
#[must_use]
pub fn ssh_profile() -> BuildProfile {
    BuildProfile {
        username: String::from("acct"),
        api_key: String::from("key"),
        api_endpoint: String::from("https://provider.invalid/rest"),
        image_name: String::from("test-image"),
        image_description: String::from("test image"),
        base_image: BaseImage::OsCode(String::from("UBUNTU_LATEST")),
        sizing: Sizing::Flavor(String::from("B1_2X8X25")),
        instance_name: String::from("kiln-test"),
        instance_domain: String::from("defaultdomain.com"),
        datacenter_name: String::from("ams01"),
        network_speed: 10,
        public_vlan_id: None,
        security_group_ids: Vec::new(),
        local_disk: false,
        state_timeout: Duration::from_millis(250),
        poll_interval: Duration::from_millis(1),
        communicator: Communicator::Ssh(SshSettings {
            username: String::from("root"),
            port: DEFAULT_SSH_PORT,
            private_key_file: None,
        }),
        provision_script: None,
    }
}

/// Profile for the password-based path with test-friendly timeouts.
#[must_use]
pub fn winrm_profile() -> BuildProfile {
    BuildProfile {
        communicator: Communicator::WinRm(WinRmSettings {
            username: String::from("Administrator"),
            password: String::from("hunter2"),
            port: 5985,
        }),
        ..ssh_profile()
    }
}
