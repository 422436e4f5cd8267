//! Provider client contract for instance and image lifecycle operations.
//!
//! The build engine talks to the cloud through this trait; the real REST
//! implementation lives in [`crate::softlayer`] and tests substitute a
//! scripted fake. The client performs single calls only — retry and polling
//! policy belong to the steps driving it.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw provider identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

identifier!(
    /// Provider identifier of a virtual guest.
    InstanceId
);
identifier!(
    /// Provider identifier of a captured image template.
    ImageId
);
identifier!(
    /// Provider identifier of a registered SSH public key.
    SshKeyId
);

/// Instance sizing: a provider-defined flavor or an explicit triple.
///
/// The two forms are mutually exclusive by construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Sizing {
    /// Named bundle of CPU, memory, and disk defined by the provider.
    Flavor(String),
    /// Explicit sizing values.
    Custom {
        /// Virtual CPU count.
        cpus: u32,
        /// Memory in megabytes.
        memory_mb: u64,
        /// Primary disk capacity in gigabytes.
        disk_gb: u32,
    },
}

/// Boot image selector: a concrete template or a provider OS code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BaseImage {
    /// Identifier of an existing image template.
    Id(String),
    /// Provider operating-system reference code, for example
    /// `UBUNTU_LATEST`.
    OsCode(String),
}

/// Parameters for creating a new virtual guest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSpec {
    /// Hostname for the new guest.
    pub hostname: String,
    /// DNS domain for the new guest.
    pub domain: String,
    /// Datacenter placement, for example `ams01`.
    pub datacenter: String,
    /// Requested sizing.
    pub sizing: Sizing,
    /// Boot image selector.
    pub base_image: BaseImage,
    /// Uplink port speed in Mbps.
    pub network_speed: u32,
    /// Optional public VLAN to place the guest on.
    pub public_vlan_id: Option<i64>,
    /// Security groups applied to the public interface.
    pub security_group_ids: Vec<i64>,
    /// Whether to use local instead of SAN disk.
    pub local_disk: bool,
    /// SSH keys injected at provisioning time.
    pub ssh_key_ids: Vec<SshKeyId>,
}

/// Lifecycle state reported by the provider for a guest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// Provisioning has not finished yet.
    Pending,
    /// The guest is provisioned and powered on.
    Active,
    /// The provider reports the guest as failed.
    Failed,
}

/// Network addresses assigned to a guest.
///
/// Address assignment is asynchronous on some providers; `None` means
/// not yet assigned, not absent forever.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstanceAddresses {
    /// Public (primary) address, once assigned.
    pub public: Option<IpAddr>,
    /// Private (backend) address, once assigned.
    pub private: Option<IpAddr>,
}

/// Errors raised by provider clients.
///
/// The taxonomy separates transient faults, which polling steps may retry
/// within their deadline, from permanent rejections that terminate the
/// build immediately.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Network-level failure before an API response was received.
    #[error("provider unreachable: {message}")]
    Transport {
        /// Underlying transport error message.
        message: String,
    },
    /// The API answered with a non-success status.
    #[error("provider returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },
    /// The API answered but the payload could not be interpreted.
    #[error("failed to decode provider response: {message}")]
    Decode {
        /// Parser error message.
        message: String,
    },
    /// The request was rejected before being sent.
    #[error("invalid provider request: {message}")]
    InvalidRequest {
        /// Description of the rejected input.
        message: String,
    },
}

impl ClientError {
    /// Returns `true` when retrying the same call later may succeed.
    ///
    /// Rate limiting and server-side failures are transient; validation
    /// rejections and undecodable payloads are permanent.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } | Self::InvalidRequest { .. } => false,
        }
    }
}

/// Future returned by provider client operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Instance and image lifecycle operations the build engine depends on.
///
/// All methods perform exactly one provider call; callers own retry policy.
pub trait ProviderClient: Send + Sync {
    /// Creates a new virtual guest and returns its identifier.
    fn create_instance<'a>(&'a self, spec: &'a InstanceSpec) -> ClientFuture<'a, InstanceId>;

    /// Reports the current lifecycle state of a guest.
    fn instance_status<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, InstanceStatus>;

    /// Looks up the addresses currently assigned to a guest.
    fn addresses<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, InstanceAddresses>;

    /// Captures the guest's disk state as a reusable image template.
    fn capture_image<'a>(
        &'a self,
        id: &'a InstanceId,
        name: &'a str,
        description: &'a str,
    ) -> ClientFuture<'a, ImageId>;

    /// Deletes a captured image template.
    fn delete_image<'a>(&'a self, id: &'a ImageId) -> ClientFuture<'a, ()>;

    /// Deletes a virtual guest.
    fn delete_instance<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, ()>;

    /// Registers an SSH public key with the provider.
    fn register_ssh_key<'a>(
        &'a self,
        label: &'a str,
        public_key: &'a str,
    ) -> ClientFuture<'a, SshKeyId>;

    /// Removes a previously registered SSH public key.
    fn delete_ssh_key<'a>(&'a self, id: &'a SshKeyId) -> ClientFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        let err = ClientError::Transport {
            message: String::from("connection refused"),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn server_side_statuses_are_transient() {
        for status in [429, 500, 503] {
            let err = ClientError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_transient(), "status {status} should be transient");
        }
    }

    #[test]
    fn client_side_statuses_are_permanent() {
        for status in [400, 401, 404, 422] {
            let err = ClientError::Api {
                status,
                message: String::new(),
            };
            assert!(!err.is_transient(), "status {status} should be permanent");
        }
    }

    #[test]
    fn invalid_request_is_permanent() {
        let err = ClientError::InvalidRequest {
            message: String::from("missing sizing"),
        };
        assert!(!err.is_transient());
    }
}
