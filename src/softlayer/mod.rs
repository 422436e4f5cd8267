//! SoftLayer-style REST implementation of the provider client.
//!
//! The API is plain JSON over HTTPS with basic authentication. Requests go
//! through one shared HTTP client with a bounded timeout; every method maps
//! to a single logical provider operation and performs no retries of its
//! own.

mod types;

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::{
    BaseImage, ClientError, ClientFuture, ImageId, InstanceAddresses, InstanceId, InstanceSpec,
    InstanceStatus, ProviderClient, Sizing, SshKeyId,
};
use types::{
    BlockDevice, CreatedObject, DiskImage, FlavorOptions, GlobalIdRef, Guest, GuestTemplate,
    IdRef, NamedRef, NetworkComponent, Parameters, PrimaryNetworkComponent, SshKeyTemplate,
    TemplateGroup,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const GUEST_MASK: &str = "mask[id,provisionDate,activeTransactionCount,\
primaryIpAddress,primaryBackendIpAddress,status.keyName]";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Provider client speaking the SoftLayer-style virtual guest REST API.
#[derive(Clone, Debug)]
pub struct SoftLayerClient {
    endpoint: String,
    username: String,
    api_key: String,
}

impl SoftLayerClient {
    /// Constructs a client against `endpoint` with basic-auth credentials.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let endpoint_string: String = endpoint.into();
        Self {
            endpoint: endpoint_string.trim_end_matches('/').to_owned(),
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let response = HTTP_CLIENT
            .get(url)
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = HTTP_CLIENT
            .post(url)
            .basic_auth(&self.username, Some(&self.api_key))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn delete(&self, url: &str) -> Result<(), ClientError> {
        let response = HTTP_CLIENT
            .delete(url)
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(api_error(status.as_u16(), response).await)
    }

    async fn get_guest(&self, id: &InstanceId) -> Result<Guest, ClientError> {
        let url = self.url(&format!(
            "SoftLayer_Virtual_Guest/{id}/getObject.json?objectMask={GUEST_MASK}"
        ));
        self.get_json(&url).await
    }

    async fn find_image_by_name(&self, name: &str) -> Result<ImageId, ClientError> {
        let url = self.url("SoftLayer_Account/getBlockDeviceTemplateGroups.json");
        let groups: Vec<TemplateGroup> = self.get_json(&url).await?;
        groups
            .into_iter()
            .filter(|group| group.name.as_deref() == Some(name))
            .max_by_key(|group| group.id)
            .map(|group| ImageId::new(group.id.to_string()))
            .ok_or_else(|| ClientError::Decode {
                message: format!("capture succeeded but no image template named `{name}` found"),
            })
    }
}

impl ProviderClient for SoftLayerClient {
    fn create_instance<'a>(&'a self, spec: &'a InstanceSpec) -> ClientFuture<'a, InstanceId> {
        Box::pin(async move {
            let url = self.url("SoftLayer_Virtual_Guest/createObject.json");
            let body = Parameters::one(guest_template(spec)?);
            let created: CreatedObject = self.post_json(&url, &body).await?;
            Ok(InstanceId::new(created.id.to_string()))
        })
    }

    fn instance_status<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, InstanceStatus> {
        Box::pin(async move {
            let guest = self.get_guest(id).await?;
            Ok(guest_status(&guest))
        })
    }

    fn addresses<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, InstanceAddresses> {
        Box::pin(async move {
            let guest = self.get_guest(id).await?;
            Ok(InstanceAddresses {
                public: parse_address(guest.primary_ip_address.as_deref()),
                private: parse_address(guest.primary_backend_ip_address.as_deref()),
            })
        })
    }

    fn capture_image<'a>(
        &'a self,
        id: &'a InstanceId,
        name: &'a str,
        description: &'a str,
    ) -> ClientFuture<'a, ImageId> {
        Box::pin(async move {
            let url = self.url(&format!(
                "SoftLayer_Virtual_Guest/{id}/createArchiveTransaction.json"
            ));
            let body = serde_json::json!({
                "parameters": [name, [], description],
            });
            let response = HTTP_CLIENT
                .post(&url)
                .basic_auth(&self.username, Some(&self.api_key))
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(api_error(status.as_u16(), response).await);
            }
            self.find_image_by_name(name).await
        })
    }

    fn delete_image<'a>(&'a self, id: &'a ImageId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&format!(
                "SoftLayer_Virtual_Guest_Block_Device_Template_Group/{id}.json"
            ));
            self.delete(&url).await
        })
    }

    fn delete_instance<'a>(&'a self, id: &'a InstanceId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&format!("SoftLayer_Virtual_Guest/{id}.json"));
            self.delete(&url).await
        })
    }

    fn register_ssh_key<'a>(
        &'a self,
        label: &'a str,
        public_key: &'a str,
    ) -> ClientFuture<'a, SshKeyId> {
        Box::pin(async move {
            let url = self.url("SoftLayer_Security_Ssh_Key/createObject.json");
            let body = Parameters::one(SshKeyTemplate {
                label: label.to_owned(),
                key: public_key.to_owned(),
            });
            let created: CreatedObject = self.post_json(&url, &body).await?;
            Ok(SshKeyId::new(created.id.to_string()))
        })
    }

    fn delete_ssh_key<'a>(&'a self, id: &'a SshKeyId) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&format!("SoftLayer_Security_Ssh_Key/{id}.json"));
            self.delete(&url).await
        })
    }
}

fn guest_template(spec: &InstanceSpec) -> Result<GuestTemplate, ClientError> {
    if spec.hostname.trim().is_empty() {
        return Err(ClientError::InvalidRequest {
            message: String::from("hostname must not be empty"),
        });
    }

    let (start_cpus, max_memory, block_devices, flavor_options) = match &spec.sizing {
        Sizing::Flavor(key_name) => (
            None,
            None,
            None,
            Some(FlavorOptions {
                flavor_key_name: key_name.clone(),
            }),
        ),
        Sizing::Custom {
            cpus,
            memory_mb,
            disk_gb,
        } => (
            Some(*cpus),
            Some(*memory_mb),
            Some(vec![BlockDevice {
                device: String::from("0"),
                disk_image: DiskImage { capacity: *disk_gb },
            }]),
            None,
        ),
    };

    let (os_code, template_group) = match &spec.base_image {
        BaseImage::OsCode(code) => (Some(code.clone()), None),
        BaseImage::Id(global_id) => (
            None,
            Some(GlobalIdRef {
                global_identifier: global_id.clone(),
            }),
        ),
    };

    let primary_network_component = build_primary_component(spec);

    Ok(GuestTemplate {
        hostname: spec.hostname.clone(),
        domain: spec.domain.clone(),
        hourly_billing_flag: true,
        local_disk_flag: spec.local_disk,
        datacenter: NamedRef {
            name: spec.datacenter.clone(),
        },
        start_cpus,
        max_memory,
        block_devices,
        supplemental_create_object_options: flavor_options,
        operating_system_reference_code: os_code,
        block_device_template_group: template_group,
        network_components: vec![NetworkComponent {
            max_speed: spec.network_speed,
        }],
        primary_network_component,
        ssh_keys: spec
            .ssh_key_ids
            .iter()
            .filter_map(|key| key.as_str().parse::<i64>().ok())
            .map(|id| IdRef { id })
            .collect(),
    })
}

fn build_primary_component(spec: &InstanceSpec) -> Option<PrimaryNetworkComponent> {
    let vlan_id = spec.public_vlan_id?;
    Some(PrimaryNetworkComponent {
        network_vlan: IdRef { id: vlan_id },
        security_groups: spec
            .security_group_ids
            .iter()
            .map(|id| IdRef { id: *id })
            .collect(),
    })
}

fn guest_status(guest: &Guest) -> InstanceStatus {
    let failed = guest
        .status
        .as_ref()
        .and_then(|status| status.key_name.as_deref())
        .is_some_and(|key| key.eq_ignore_ascii_case("failed"));
    if failed {
        return InstanceStatus::Failed;
    }

    let transactions_settled = guest.active_transaction_count.unwrap_or(0) == 0;
    if guest.provision_date.is_some() && transactions_settled {
        InstanceStatus::Active
    } else {
        InstanceStatus::Pending
    }
}

fn parse_address(raw: Option<&str>) -> Option<IpAddr> {
    raw.and_then(|value| IpAddr::from_str(value).ok())
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::Transport {
        message: err.to_string(),
    }
}

async fn api_error(status: u16, response: reqwest::Response) -> ClientError {
    let message = response.text().await.unwrap_or_default();
    ClientError::Api { status, message }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status.as_u16(), response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::Decode {
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> InstanceSpec {
        InstanceSpec {
            hostname: String::from("kiln-test"),
            domain: String::from("defaultdomain.com"),
            datacenter: String::from("ams01"),
            sizing: Sizing::Flavor(String::from("B1_2X8X25")),
            base_image: BaseImage::OsCode(String::from("UBUNTU_LATEST")),
            network_speed: 10,
            public_vlan_id: None,
            security_group_ids: Vec::new(),
            local_disk: false,
            ssh_key_ids: Vec::new(),
        }
    }

    fn template_json(spec: &InstanceSpec) -> serde_json::Value {
        let template = guest_template(spec).unwrap_or_else(|err| panic!("template: {err}"));
        serde_json::to_value(template).unwrap_or_else(|err| panic!("serialize: {err}"))
    }

    #[test]
    fn flavor_sizing_uses_supplemental_options() {
        let value = template_json(&base_spec());
        assert_eq!(
            value
                .pointer("/supplementalCreateObjectOptions/flavorKeyName")
                .and_then(serde_json::Value::as_str),
            Some("B1_2X8X25")
        );
        assert!(value.get("startCpus").is_none());
        assert!(value.get("blockDevices").is_none());
    }

    #[test]
    fn custom_sizing_sets_explicit_members() {
        let spec = InstanceSpec {
            sizing: Sizing::Custom {
                cpus: 2,
                memory_mb: 4096,
                disk_gb: 25,
            },
            ..base_spec()
        };
        let value = template_json(&spec);
        assert_eq!(
            value.get("startCpus").and_then(serde_json::Value::as_u64),
            Some(2)
        );
        assert_eq!(
            value.get("maxMemory").and_then(serde_json::Value::as_u64),
            Some(4096)
        );
        assert_eq!(
            value
                .pointer("/blockDevices/0/diskImage/capacity")
                .and_then(serde_json::Value::as_u64),
            Some(25)
        );
        assert!(value.get("supplementalCreateObjectOptions").is_none());
    }

    #[test]
    fn base_image_id_maps_to_template_group() {
        let spec = InstanceSpec {
            base_image: BaseImage::Id(String::from("global-id-1")),
            ..base_spec()
        };
        let value = template_json(&spec);
        assert_eq!(
            value
                .pointer("/blockDeviceTemplateGroup/globalIdentifier")
                .and_then(serde_json::Value::as_str),
            Some("global-id-1")
        );
        assert!(value.get("operatingSystemReferenceCode").is_none());
    }

    #[test]
    fn ssh_keys_serialise_as_id_refs() {
        let spec = InstanceSpec {
            ssh_key_ids: vec![SshKeyId::new("42")],
            ..base_spec()
        };
        let value = template_json(&spec);
        assert_eq!(
            value
                .pointer("/sshKeys/0/id")
                .and_then(serde_json::Value::as_i64),
            Some(42)
        );
    }

    #[test]
    fn empty_hostname_is_a_permanent_rejection() {
        let spec = InstanceSpec {
            hostname: String::from("  "),
            ..base_spec()
        };
        let err = guest_template(&spec).expect_err("empty hostname");
        assert!(!err.is_transient());
    }

    #[test]
    fn provisioned_guest_without_transactions_is_active() {
        let guest = Guest {
            provision_date: Some(String::from("2026-01-01T00:00:00+00:00")),
            active_transaction_count: Some(0),
            primary_ip_address: None,
            primary_backend_ip_address: None,
            status: None,
        };
        assert_eq!(guest_status(&guest), InstanceStatus::Active);
    }

    #[test]
    fn guest_mid_transaction_is_pending() {
        let guest = Guest {
            provision_date: Some(String::from("2026-01-01T00:00:00+00:00")),
            active_transaction_count: Some(2),
            primary_ip_address: None,
            primary_backend_ip_address: None,
            status: None,
        };
        assert_eq!(guest_status(&guest), InstanceStatus::Pending);
    }

    #[test]
    fn failed_status_key_wins() {
        let guest = Guest {
            provision_date: Some(String::from("2026-01-01T00:00:00+00:00")),
            active_transaction_count: Some(0),
            primary_ip_address: None,
            primary_backend_ip_address: None,
            status: Some(types::StatusRef {
                key_name: Some(String::from("FAILED")),
            }),
        };
        assert_eq!(guest_status(&guest), InstanceStatus::Failed);
    }

    #[test]
    fn addresses_parse_or_stay_unassigned() {
        assert_eq!(
            parse_address(Some("192.0.2.10")),
            Some(IpAddr::from_str("192.0.2.10").unwrap_or_else(|err| panic!("ip: {err}")))
        );
        assert_eq!(parse_address(Some("not-an-ip")), None);
        assert_eq!(parse_address(None), None);
    }
}
