//! Communicator selection and connection details.
//!
//! A build reaches its instance over one of two communicator kinds:
//! key-based SSH or password-based WinRM. The kind fixes the step sequence;
//! the settings carry everything the connect step and the provisioning hook
//! need to reach the guest.

pub mod runner;

use std::net::IpAddr;

use camino::Utf8PathBuf;

/// Default TCP port for SSH communicators.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default TCP port for WinRM communicators (HTTP transport).
pub const DEFAULT_WINRM_PORT: u16 = 5985;

/// The two supported communicator kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommunicatorKind {
    /// Key-based SSH.
    Ssh,
    /// Password-based WinRM.
    WinRm,
}

/// Settings for the key-based SSH communicator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshSettings {
    /// Login user on the guest.
    pub username: String,
    /// TCP port the SSH daemon listens on.
    pub port: u16,
    /// Existing private key to use instead of generating one. The public
    /// half is expected beside it with a `.pub` suffix.
    pub private_key_file: Option<Utf8PathBuf>,
}

/// Settings for the password-based WinRM communicator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WinRmSettings {
    /// Login user on the guest.
    pub username: String,
    /// Login password on the guest.
    pub password: String,
    /// TCP port the WinRM listener is bound to.
    pub port: u16,
}

/// Resolved communicator configuration for a build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Communicator {
    /// Key-based SSH path.
    Ssh(SshSettings),
    /// Password-based WinRM path.
    WinRm(WinRmSettings),
}

impl Communicator {
    /// Returns the communicator kind.
    #[must_use]
    pub const fn kind(&self) -> CommunicatorKind {
        match self {
            Self::Ssh(_) => CommunicatorKind::Ssh,
            Self::WinRm(_) => CommunicatorKind::WinRm,
        }
    }

    /// Returns the TCP port the connect step probes.
    #[must_use]
    pub const fn port(&self) -> u16 {
        match self {
            Self::Ssh(settings) => settings.port,
            Self::WinRm(settings) => settings.port,
        }
    }
}

/// Credential material resolved for an established connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Credentials {
    /// Key-based login using a private key file on disk.
    Key {
        /// Login user on the guest.
        username: String,
        /// Path to the private key.
        private_key_path: Utf8PathBuf,
    },
    /// Password-based login.
    Password {
        /// Login user on the guest.
        username: String,
        /// Login password on the guest.
        password: String,
    },
}

/// A reachable guest endpoint plus the credentials to authenticate with.
///
/// Written into the build state by the connect step and consumed by the
/// provisioning hook.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Connection {
    /// Address the communicator connects to.
    pub host: IpAddr,
    /// TCP port the communicator connects to.
    pub port: u16,
    /// Login material for the communicator.
    pub credentials: Credentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_settings() -> SshSettings {
        SshSettings {
            username: String::from("root"),
            port: DEFAULT_SSH_PORT,
            private_key_file: None,
        }
    }

    #[test]
    fn communicator_kind_matches_variant() {
        assert_eq!(
            Communicator::Ssh(ssh_settings()).kind(),
            CommunicatorKind::Ssh
        );
        let winrm = Communicator::WinRm(WinRmSettings {
            username: String::from("Administrator"),
            password: String::from("hunter2"),
            port: DEFAULT_WINRM_PORT,
        });
        assert_eq!(winrm.kind(), CommunicatorKind::WinRm);
    }

    #[test]
    fn communicator_port_comes_from_settings() {
        let comm = Communicator::Ssh(SshSettings {
            port: 2222,
            ..ssh_settings()
        });
        assert_eq!(comm.port(), 2222);
    }
}
