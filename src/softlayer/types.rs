//! Wire payloads for the SoftLayer-style REST API.
//!
//! The API wraps request bodies in a `parameters` array and uses camelCase
//! member names; these structs mirror only the members kiln touches.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct Parameters<T> {
    pub(crate) parameters: Vec<T>,
}

impl<T> Parameters<T> {
    pub(crate) fn one(value: T) -> Self {
        Self {
            parameters: vec![value],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuestTemplate {
    pub(crate) hostname: String,
    pub(crate) domain: String,
    pub(crate) hourly_billing_flag: bool,
    pub(crate) local_disk_flag: bool,
    pub(crate) datacenter: NamedRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) start_cpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) block_devices: Option<Vec<BlockDevice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) supplemental_create_object_options: Option<FlavorOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) operating_system_reference_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) block_device_template_group: Option<GlobalIdRef>,
    pub(crate) network_components: Vec<NetworkComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) primary_network_component: Option<PrimaryNetworkComponent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) ssh_keys: Vec<IdRef>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NamedRef {
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FlavorOptions {
    pub(crate) flavor_key_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GlobalIdRef {
    pub(crate) global_identifier: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockDevice {
    pub(crate) device: String,
    pub(crate) disk_image: DiskImage,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiskImage {
    pub(crate) capacity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NetworkComponent {
    pub(crate) max_speed: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrimaryNetworkComponent {
    pub(crate) network_vlan: IdRef,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) security_groups: Vec<IdRef>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IdRef {
    pub(crate) id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SshKeyTemplate {
    pub(crate) label: String,
    pub(crate) key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedObject {
    pub(crate) id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Guest {
    #[serde(default)]
    pub(crate) provision_date: Option<String>,
    #[serde(default)]
    pub(crate) active_transaction_count: Option<u32>,
    #[serde(default)]
    pub(crate) primary_ip_address: Option<String>,
    #[serde(default)]
    pub(crate) primary_backend_ip_address: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<StatusRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusRef {
    #[serde(default)]
    pub(crate) key_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TemplateGroup {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) name: Option<String>,
}
