//! Provisioning hooks invoked once the instance is reachable.
//!
//! The build engine treats provisioning as an injected capability: the hook
//! receives the established connection and does whatever the caller wants
//! with it. kiln ships a shell-script hook for the key-based path and a
//! no-op hook for builds that only capture a stock image.

use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;
use thiserror::Error;

use crate::comms::runner::{CommandError, CommandRunner, ProcessCommandRunner};
use crate::comms::{Connection, Credentials};
use crate::ui::Ui;

/// Errors raised by provisioning hooks.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the hook cannot authenticate with the given credentials.
    #[error("provisioning hook does not support this connection: {message}")]
    Unsupported {
        /// Why the connection cannot be used.
        message: String,
    },
    /// Raised when the provisioning script cannot be read.
    #[error("failed to read provisioning script `{path}`: {message}")]
    Script {
        /// Script path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the remote command exits unsuccessfully.
    #[error("provisioning command failed with status {status_text}: {stderr}")]
    CommandFailure {
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from the SSH client.
        stderr: String,
    },
    /// Raised when the SSH client cannot be started.
    #[error(transparent)]
    Spawn(#[from] CommandError),
}

/// Future returned by provisioning hooks.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>>;

/// User provisioning invoked with the connected guest.
pub trait ProvisionHook: Send + Sync {
    /// Provisions the guest reachable through `connection`.
    fn provision<'a>(&'a self, connection: &'a Connection, ui: &'a dyn Ui) -> HookFuture<'a>;
}

/// Hook that runs a local shell script on the guest over the system `ssh`
/// client.
///
/// Only key-based connections are supported; the password-based WinRM path
/// needs a transport client kiln does not ship.
pub struct ShellHook {
    script: Utf8PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl ShellHook {
    /// Creates a hook running `script` through the real process runner.
    #[must_use]
    pub fn new(script: Utf8PathBuf) -> Self {
        Self::with_runner(script, Box::new(ProcessCommandRunner))
    }

    /// Creates a hook with a caller-supplied command runner.
    #[must_use]
    pub fn with_runner(script: Utf8PathBuf, runner: Box<dyn CommandRunner>) -> Self {
        Self { script, runner }
    }

    fn run_script(&self, connection: &Connection, ui: &dyn Ui) -> Result<(), ProvisionError> {
        let Credentials::Key {
            username,
            private_key_path,
        } = &connection.credentials
        else {
            return Err(ProvisionError::Unsupported {
                message: String::from("shell provisioning requires key-based credentials"),
            });
        };

        let script_body = read_script(&self.script)?;
        ui.say(&format!("running provisioning script {}", self.script));

        let args = ssh_args(
            username,
            connection.host.to_string().as_str(),
            connection.port,
            private_key_path,
            &script_body,
        );
        let output = self.runner.run("ssh", &args)?;
        if output.is_success() {
            return Ok(());
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(ProvisionError::CommandFailure {
            status_text,
            stderr: output.stderr,
        })
    }
}

impl ProvisionHook for ShellHook {
    fn provision<'a>(&'a self, connection: &'a Connection, ui: &'a dyn Ui) -> HookFuture<'a> {
        Box::pin(async move { self.run_script(connection, ui) })
    }
}

/// Hook that performs no provisioning.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl ProvisionHook for NoopHook {
    fn provision<'a>(&'a self, _connection: &'a Connection, ui: &'a dyn Ui) -> HookFuture<'a> {
        Box::pin(async move {
            ui.say("no provisioning script configured; skipping");
            Ok(())
        })
    }
}

/// Builds the SSH argument list that runs `script_body` on the guest.
#[must_use]
pub fn ssh_args(
    username: &str,
    host: &str,
    port: u16,
    private_key_path: &Utf8Path,
    script_body: &str,
) -> Vec<OsString> {
    let remote = format!("sh -c {}", escape(script_body.into()));
    vec![
        OsString::from("-i"),
        OsString::from(private_key_path.as_str()),
        OsString::from("-p"),
        OsString::from(port.to_string()),
        OsString::from("-o"),
        OsString::from("BatchMode=yes"),
        OsString::from("-o"),
        OsString::from("StrictHostKeyChecking=no"),
        OsString::from("-o"),
        OsString::from("UserKnownHostsFile=/dev/null"),
        OsString::from(format!("{username}@{host}")),
        OsString::from("--"),
        OsString::from(remote),
    ]
}

fn read_script(path: &Utf8Path) -> Result<String, ProvisionError> {
    let (dir_path, file_name) = if path.is_absolute() {
        let parent = path.parent().ok_or_else(|| ProvisionError::Script {
            path: path.to_owned().into_string(),
            message: String::from("path has no parent directory"),
        })?;
        let file_name = path.file_name().ok_or_else(|| ProvisionError::Script {
            path: path.to_owned().into_string(),
            message: String::from("path has no file name"),
        })?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir = Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| {
        ProvisionError::Script {
            path: path.to_owned().into_string(),
            message: err.to_string(),
        }
    })?;
    dir.read_to_string(file_name)
        .map_err(|err| ProvisionError::Script {
            path: path.to_owned().into_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_args_escape_script_body() {
        let args = ssh_args(
            "root",
            "192.0.2.10",
            22,
            Utf8Path::new("/tmp/key"),
            "echo 'hello world'",
        );
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered.last().map(String::as_str),
            Some("sh -c 'echo '\\''hello world'\\'''")
        );
        assert!(rendered.contains(&String::from("root@192.0.2.10")));
        assert!(rendered.contains(&String::from("BatchMode=yes")));
    }

    #[test]
    fn ssh_args_carry_port_and_key() {
        let args = ssh_args("root", "192.0.2.10", 2222, Utf8Path::new("/tmp/key"), "true");
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.windows(2).any(|pair| {
            matches!(pair, [flag, value] if flag.as_str() == "-p" && value.as_str() == "2222")
        }));
        assert!(rendered.windows(2).any(|pair| {
            matches!(pair, [flag, value] if flag.as_str() == "-i" && value.as_str() == "/tmp/key")
        }));
    }
}
