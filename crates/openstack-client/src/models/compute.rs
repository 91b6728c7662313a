//! Nova v2 models: servers, flavors, images, keypairs, security groups,
//! volume attachments and nova-network floating IPs.

use super::{de_id, de_opt_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to another resource by id (`{"id": ..., "links": [...]}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
}

/// One address of a server on a network pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
    pub version: u8,
    #[serde(rename = "OS-EXT-IPS-MAC:mac_addr", default)]
    pub mac_addr: Option<String>,
}

/// Server model matching the Nova `server` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub key_name: Option<String>,
    /// `{"id": ...}` or an empty string when booted from a volume
    #[serde(default)]
    pub image: serde_json::Value,
    #[serde(default)]
    pub flavor: Option<ResourceRef>,
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<ServerAddress>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(rename = "adminPass", default, skip_serializing)]
    pub admin_pass: Option<String>,
}

impl Server {
    /// Image id, unless the server was booted from a volume
    #[must_use]
    pub fn image_id(&self) -> Option<&str> {
        self.image.get("id").and_then(serde_json::Value::as_str)
    }

    /// Flavor id
    #[must_use]
    pub fn flavor_id(&self) -> Option<&str> {
        self.flavor.as_ref().map(|f| f.id.as_str())
    }
}

/// Network attachment requested at boot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerNetwork {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip: Option<String>,
}

/// Parameters for booting a server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateServerRequest {
    pub name: String,
    pub image_ref: String,
    pub flavor_ref: String,
    pub security_groups: Vec<String>,
    pub networks: Vec<ServerNetwork>,
    /// Raw user data; base64-encoded on the wire
    pub user_data: Option<String>,
    pub admin_pass: Option<String>,
    pub config_drive: bool,
    pub metadata: BTreeMap<String, String>,
    pub key_name: Option<String>,
    pub availability_zone: Option<String>,
}

/// Flavor model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub vcpus: u32,
    #[serde(default)]
    pub disk: u64,
}

/// Image model (Nova image proxy)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// Keypair model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Source CIDR of a security group rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    #[serde(default)]
    pub cidr: Option<String>,
}

/// Source group of a security group rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Nova security group rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub parent_group_id: String,
    #[serde(default)]
    pub from_port: Option<i32>,
    #[serde(default)]
    pub to_port: Option<i32>,
    #[serde(default)]
    pub ip_protocol: Option<String>,
    #[serde(default)]
    pub ip_range: IpRange,
    #[serde(default)]
    pub group: GroupRef,
}

/// Nova security group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

/// Parameters for a new security group rule; exactly one of `cidr` or
/// `group_id` is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecurityGroupRule {
    pub parent_group_id: String,
    pub from_port: i32,
    pub to_port: i32,
    pub ip_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Volume attachment on a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    pub id: String,
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(rename = "volumeId")]
    pub volume_id: String,
    #[serde(default)]
    pub device: Option<String>,
}

/// nova-network floating IP (`os-floating-ips`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaFloatingIp {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub pool: String,
    pub ip: String,
    #[serde(default)]
    pub fixed_ip: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub instance_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_from_nova_body() {
        let body = serde_json::json!({
            "id": "srv-1",
            "name": "web",
            "status": "ACTIVE",
            "tenant_id": "t-1",
            "user_id": "u-1",
            "image": {"id": "img-1", "links": []},
            "flavor": {"id": "1", "links": []},
            "addresses": {
                "private": [
                    {"addr": "10.0.0.3", "version": 4, "OS-EXT-IPS-MAC:mac_addr": "fa:16:3e:00:00:01"}
                ]
            },
            "metadata": {"role": "web"}
        });
        let server: Server = serde_json::from_value(body).unwrap();
        assert_eq!(server.image_id(), Some("img-1"));
        assert_eq!(server.flavor_id(), Some("1"));
        assert_eq!(server.addresses["private"][0].mac_addr.as_deref(), Some("fa:16:3e:00:00:01"));
    }

    #[test]
    fn test_boot_from_volume_has_no_image() {
        let server: Server = serde_json::from_str(r#"{"id": "srv-2", "image": ""}"#).unwrap();
        assert_eq!(server.image_id(), None);
    }

    #[test]
    fn test_nova_network_floating_ip_integer_ids() {
        let fip: NovaFloatingIp = serde_json::from_str(
            r#"{"id": 12, "pool": "public", "ip": "172.24.4.3", "fixed_ip": null, "instance_id": null}"#,
        )
        .unwrap();
        assert_eq!(fip.id, "12");
        assert_eq!(fip.instance_id, None);
    }
}
