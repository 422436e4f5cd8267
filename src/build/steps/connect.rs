//! Communicator connection step.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::build::error::BuildError;
use crate::build::state::BuildState;
use crate::build::step::{Step, StepFuture, StepOutcome};
use crate::comms::{Communicator, Connection, Credentials};

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Establishes the communicator connection to the guest.
///
/// Resolves the connect host from the build state, resolves credentials
/// from the communicator settings (the temporary key on the ssh path, the
/// configured password on the winrm path), and probes TCP reachability of
/// the communicator port until the state timeout elapses.
#[derive(Clone, Copy, Debug, Default)]
pub struct Connect;

impl Step for Connect {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState) -> StepFuture<'a, StepOutcome> {
        Box::pin(async move {
            let looked_up = state.public_ip();
            let host = match looked_up {
                Ok(host) => host,
                Err(err) => return state.fail(err.into()),
            };

            let communicator = state.profile().communicator.clone();
            let port = communicator.port();
            let credentials = match resolve_credentials(&communicator, state) {
                Ok(credentials) => credentials,
                Err(err) => return state.fail(err),
            };

            state
                .ui()
                .say(&format!("Waiting for the communicator at {host}:{port}..."));

            let wait_timeout = state.profile().state_timeout;
            let interval = state.profile().poll_interval;
            let started = Instant::now();
            loop {
                let attempt = timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect((host, port))).await;
                if matches!(attempt, Ok(Ok(_))) {
                    state.ui().say("Connected");
                    state.set_connection(Connection {
                        host,
                        port,
                        credentials,
                    });
                    return StepOutcome::Continue;
                }

                let waited = started.elapsed();
                if waited >= wait_timeout {
                    return state.fail(BuildError::ConnectTimeout {
                        host: host.to_string(),
                        port,
                    });
                }
                sleep(interval.min(wait_timeout.saturating_sub(waited))).await;
            }
        })
    }

    fn cleanup<'a>(&'a mut self, _state: &'a mut BuildState) -> StepFuture<'a, ()> {
        Box::pin(async {})
    }
}

fn resolve_credentials(
    communicator: &Communicator,
    state: &BuildState,
) -> Result<Credentials, BuildError> {
    match communicator {
        Communicator::Ssh(settings) => {
            let key = state.ssh_key()?;
            Ok(Credentials::Key {
                username: settings.username.clone(),
                private_key_path: key.material.private_key_path.clone(),
            })
        }
        Communicator::WinRm(settings) => Ok(Credentials::Password {
            username: settings.username.clone(),
            password: settings.password.clone(),
        }),
    }
}
