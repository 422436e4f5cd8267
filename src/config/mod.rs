//! Build configuration loading and resolution.
//!
//! [`BuildConfig`] is the raw, layered view merged by `ortho-config` from
//! defaults, configuration files, environment variables, and CLI flags.
//! [`BuildConfig::resolve`] turns it into a typed [`BuildProfile`]: defaults
//! are populated, mutually-exclusive pairs collapse into enums, and duration
//! strings become bounded [`Duration`]s. Validation reports every problem at
//! once instead of stopping at the first, so an operator fixes a broken
//! configuration in one pass.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::client::{BaseImage, Sizing};
use crate::comms::{
    Communicator, DEFAULT_SSH_PORT, DEFAULT_WINRM_PORT, SshSettings, WinRmSettings,
};

mod duration;

pub use duration::{DurationError, parse_duration};

const DEFAULT_API_ENDPOINT: &str = "https://api.softlayer.com/rest/v3.1";
const DEFAULT_DATACENTER: &str = "ams01";
const DEFAULT_DOMAIN: &str = "defaultdomain.com";
const DEFAULT_IMAGE_DESCRIPTION: &str = "Instance snapshot. Generated by kiln.";
const DEFAULT_NETWORK_SPEED: u32 = 10;
const DEFAULT_STATE_TIMEOUT: &str = "10m";
const DEFAULT_POLL_INTERVAL: &str = "5s";
const DEFAULT_SSH_USERNAME: &str = "root";
const DEFAULT_WINRM_USERNAME: &str = "Administrator";

/// The only image type the capture call supports.
pub const IMAGE_TYPE_STANDARD: &str = "standard";

/// Raw build configuration merged from configuration sources.
///
/// Every field is optional at this layer; requiredness and consistency are
/// enforced by [`BuildConfig::resolve`] so that all problems surface in a
/// single report.
#[derive(Clone, Debug, Default, Deserialize, Eq, OrthoConfig, PartialEq)]
#[ortho_config(prefix = "KILN")]
pub struct BuildConfig {
    /// Provider account username.
    pub username: Option<String>,
    /// Provider API key paired with the username.
    pub api_key: Option<String>,
    /// Provider REST endpoint. Defaults to the public endpoint.
    pub api_endpoint: Option<String>,
    /// Name given to the captured image. Required.
    pub image_name: Option<String>,
    /// Description attached to the captured image.
    pub image_description: Option<String>,
    /// Image capture type. Only `standard` is supported.
    pub image_type: Option<String>,
    /// Identifier of an existing image template to boot from.
    /// Mutually exclusive with `base_os_code`.
    pub base_image_id: Option<String>,
    /// Provider operating-system reference code to boot from.
    /// Mutually exclusive with `base_image_id`.
    pub base_os_code: Option<String>,
    /// Hostname for the build guest. Defaults to a generated `kiln-` name.
    pub instance_name: Option<String>,
    /// DNS domain for the build guest.
    pub instance_domain: Option<String>,
    /// Named sizing flavor. Mutually exclusive with the explicit triple.
    pub instance_flavor: Option<String>,
    /// Explicit CPU count. Requires memory and disk as well.
    pub instance_cpu: Option<u32>,
    /// Explicit memory in megabytes. Requires CPU and disk as well.
    pub instance_memory: Option<u64>,
    /// Explicit disk capacity in gigabytes. Requires CPU and memory as well.
    pub instance_disk_capacity: Option<u32>,
    /// Uplink port speed in Mbps.
    pub instance_network_speed: Option<u32>,
    /// Use local instead of SAN disk.
    pub instance_local_disk: Option<bool>,
    /// Public VLAN to place the guest on.
    pub public_vlan_id: Option<i64>,
    /// Security groups applied to the public interface.
    pub public_security_group_ids: Option<Vec<i64>>,
    /// Datacenter placement.
    pub datacenter_name: Option<String>,
    /// Upper bound for every state transition wait, for example `10m`.
    pub instance_state_timeout: Option<String>,
    /// Interval between provider polls, for example `5s`.
    pub instance_state_poll_interval: Option<String>,
    /// Communicator kind: `ssh` or `winrm`.
    pub communicator: Option<String>,
    /// Login user for the SSH communicator.
    pub ssh_username: Option<String>,
    /// TCP port for the SSH communicator.
    pub ssh_port: Option<u16>,
    /// Existing private key for the SSH communicator; a throwaway pair is
    /// generated when unset.
    pub ssh_private_key_file: Option<String>,
    /// Login user for the WinRM communicator.
    pub winrm_username: Option<String>,
    /// Login password for the WinRM communicator. Required on that path.
    pub winrm_password: Option<String>,
    /// TCP port for the WinRM communicator.
    pub winrm_port: Option<u16>,
    /// Shell script run on the guest by the default provisioning hook.
    pub provision_script: Option<String>,
}

/// Validated, fully-populated configuration a build runs against.
///
/// Immutable for the duration of a build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildProfile {
    /// Provider account username.
    pub username: String,
    /// Provider API key.
    pub api_key: String,
    /// Provider REST endpoint.
    pub api_endpoint: String,
    /// Name given to the captured image.
    pub image_name: String,
    /// Description attached to the captured image.
    pub image_description: String,
    /// Boot image selector.
    pub base_image: BaseImage,
    /// Instance sizing.
    pub sizing: Sizing,
    /// Hostname for the build guest.
    pub instance_name: String,
    /// DNS domain for the build guest.
    pub instance_domain: String,
    /// Datacenter placement.
    pub datacenter_name: String,
    /// Uplink port speed in Mbps.
    pub network_speed: u32,
    /// Public VLAN to place the guest on.
    pub public_vlan_id: Option<i64>,
    /// Security groups applied to the public interface.
    pub security_group_ids: Vec<i64>,
    /// Use local instead of SAN disk.
    pub local_disk: bool,
    /// Upper bound for every state transition wait.
    pub state_timeout: Duration,
    /// Interval between provider polls.
    pub poll_interval: Duration,
    /// Resolved communicator configuration.
    pub communicator: Communicator,
    /// Shell script for the default provisioning hook, when configured.
    pub provision_script: Option<Utf8PathBuf>,
}

/// Errors raised during configuration loading and resolution.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// One or more configuration problems, reported together.
    #[error("invalid configuration: {}", .issues.join("; "))]
    Invalid {
        /// Every problem found during resolution.
        issues: Vec<String>,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration loading failed: {0}")]
    Load(String),
}

impl BuildConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Load(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("kiln")])
            .map_err(|err| ConfigError::Load(err.to_string()))
    }

    /// Resolves the raw configuration into a [`BuildProfile`].
    ///
    /// Defaults are populated the way the provider expects them, the
    /// mutually-exclusive field pairs collapse into enums, and duration
    /// strings are parsed. All problems are aggregated into a single
    /// [`ConfigError::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every validation problem.
    pub fn resolve(&self) -> Result<BuildProfile, ConfigError> {
        let mut issues = Vec::new();

        let username = required_string(self.username.as_deref(), "username", &mut issues);
        let api_key = required_string(self.api_key.as_deref(), "api_key", &mut issues);
        let image_name = required_string(self.image_name.as_deref(), "image_name", &mut issues);

        let image_type = self
            .image_type
            .clone()
            .unwrap_or_else(|| IMAGE_TYPE_STANDARD.to_owned());
        if image_type != IMAGE_TYPE_STANDARD {
            issues.push(format!(
                "unknown image_type `{image_type}`; must be `{IMAGE_TYPE_STANDARD}`"
            ));
        }

        let base_image = self.resolve_base_image(&mut issues);
        let sizing = self.resolve_sizing(&mut issues);
        let state_timeout = resolve_duration(
            self.instance_state_timeout.as_deref(),
            DEFAULT_STATE_TIMEOUT,
            "instance_state_timeout",
            &mut issues,
        );
        let poll_interval = resolve_duration(
            self.instance_state_poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
            "instance_state_poll_interval",
            &mut issues,
        );
        let communicator = self.resolve_communicator(&mut issues);

        if !issues.is_empty() {
            return Err(ConfigError::Invalid { issues });
        }

        // All resolvers return placeholders only after pushing an issue, so
        // reaching this point means every value is present.
        Ok(BuildProfile {
            username,
            api_key,
            api_endpoint: self
                .api_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_owned()),
            image_name,
            image_description: self
                .image_description
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_DESCRIPTION.to_owned()),
            base_image,
            sizing,
            instance_name: self
                .instance_name
                .clone()
                .unwrap_or_else(|| format!("kiln-{}", Uuid::new_v4().simple())),
            instance_domain: self
                .instance_domain
                .clone()
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned()),
            datacenter_name: self
                .datacenter_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DATACENTER.to_owned()),
            network_speed: self.instance_network_speed.unwrap_or(DEFAULT_NETWORK_SPEED),
            public_vlan_id: self.public_vlan_id,
            security_group_ids: self.public_security_group_ids.clone().unwrap_or_default(),
            local_disk: self.instance_local_disk.unwrap_or(false),
            state_timeout,
            poll_interval,
            communicator,
            provision_script: self.provision_script.clone().map(Utf8PathBuf::from),
        })
    }

    fn resolve_base_image(&self, issues: &mut Vec<String>) -> BaseImage {
        match (self.base_image_id.as_deref(), self.base_os_code.as_deref()) {
            (Some(id), None) => BaseImage::Id(id.to_owned()),
            (None, Some(code)) => BaseImage::OsCode(code.to_owned()),
            (Some(_), Some(_)) => {
                issues.push(String::from(
                    "please specify only one of base_image_id or base_os_code",
                ));
                BaseImage::OsCode(String::new())
            }
            (None, None) => {
                issues.push(String::from(
                    "please specify base_image_id or base_os_code",
                ));
                BaseImage::OsCode(String::new())
            }
        }
    }

    fn resolve_sizing(&self, issues: &mut Vec<String>) -> Sizing {
        let custom = [
            self.instance_cpu.is_some(),
            self.instance_memory.is_some(),
            self.instance_disk_capacity.is_some(),
        ];
        let any_custom = custom.iter().any(|set| *set);
        let all_custom = custom.iter().all(|set| *set);

        match (&self.instance_flavor, any_custom) {
            (Some(_), true) => {
                issues.push(String::from(
                    "instance_flavor must be specified without instance_cpu, \
                     instance_memory, and instance_disk_capacity",
                ));
                Sizing::Flavor(String::new())
            }
            (Some(flavor), false) => Sizing::Flavor(flavor.clone()),
            (None, true) if all_custom => Sizing::Custom {
                cpus: self.instance_cpu.unwrap_or_default(),
                memory_mb: self.instance_memory.unwrap_or_default(),
                disk_gb: self.instance_disk_capacity.unwrap_or_default(),
            },
            (None, true) => {
                issues.push(String::from(
                    "explicit sizing requires instance_cpu, instance_memory, \
                     and instance_disk_capacity together",
                ));
                Sizing::Flavor(String::new())
            }
            (None, false) => {
                issues.push(String::from(
                    "instance_flavor or explicit sizing must be specified",
                ));
                Sizing::Flavor(String::new())
            }
        }
    }

    fn resolve_communicator(&self, issues: &mut Vec<String>) -> Communicator {
        let kind = self.communicator.as_deref().unwrap_or("ssh");
        match kind {
            "ssh" => Communicator::Ssh(SshSettings {
                username: self
                    .ssh_username
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SSH_USERNAME.to_owned()),
                port: self.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
                private_key_file: self.ssh_private_key_file.clone().map(Utf8PathBuf::from),
            }),
            "winrm" => {
                let password = self.winrm_password.clone().unwrap_or_default();
                if password.trim().is_empty() {
                    issues.push(String::from(
                        "winrm_password must be specified for the winrm communicator",
                    ));
                }
                Communicator::WinRm(WinRmSettings {
                    username: self
                        .winrm_username
                        .clone()
                        .unwrap_or_else(|| DEFAULT_WINRM_USERNAME.to_owned()),
                    password,
                    port: self.winrm_port.unwrap_or(DEFAULT_WINRM_PORT),
                })
            }
            other => {
                issues.push(format!(
                    "unsupported communicator `{other}`; must be `ssh` or `winrm`"
                ));
                Communicator::Ssh(SshSettings {
                    username: String::new(),
                    port: DEFAULT_SSH_PORT,
                    private_key_file: None,
                })
            }
        }
    }
}

fn required_string(value: Option<&str>, field: &str, issues: &mut Vec<String>) -> String {
    match value {
        Some(present) if !present.trim().is_empty() => present.trim().to_owned(),
        _ => {
            issues.push(format!("{field} must be specified"));
            String::new()
        }
    }
}

fn resolve_duration(
    value: Option<&str>,
    default: &str,
    field: &str,
    issues: &mut Vec<String>,
) -> Duration {
    let raw = value.unwrap_or(default);
    match parse_duration(raw) {
        Ok(duration) => duration,
        Err(err) => {
            issues.push(format!("failed parsing {field}: {err}"));
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests;
