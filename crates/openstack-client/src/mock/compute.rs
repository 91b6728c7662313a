//! Compute operations for MockOpenStackClient
//!
//! Handles servers, flavors, images, keypairs, security groups, volume
//! attachments and nova-network floating IPs

use super::{MockOpenStackClient, Tracked, conflict, lock, not_found, poll_tracked};
use crate::error::OpenStackError;
use crate::models::*;
use std::collections::BTreeMap;

fn default_addresses(n: u64) -> BTreeMap<String, Vec<ServerAddress>> {
    let mut addresses = BTreeMap::new();
    addresses.insert(
        "private".to_string(),
        vec![ServerAddress {
            addr: format!("10.0.0.{}", n % 250 + 2),
            version: 4,
            mac_addr: Some(format!("fa:16:3e:00:00:{:02x}", n % 256)),
        }],
    );
    addresses
}

pub async fn create_server(client: &MockOpenStackClient, request: &CreateServerRequest) -> Result<Server, OpenStackError> {
    client.enter("create_server")?;
    let n = client.next_number();
    let addresses = lock(&client.server_addresses)
        .clone()
        .unwrap_or_else(|| default_addresses(n));

    let server = Server {
        id: format!("server-{n}"),
        name: request.name.clone(),
        status: "BUILD".to_string(),
        tenant_id: client.tenant_id.clone(),
        user_id: "mock-user".to_string(),
        created: "2026-01-01T00:00:00Z".to_string(),
        updated: "2026-01-01T00:00:00Z".to_string(),
        key_name: request.key_name.clone(),
        image: serde_json::json!({ "id": request.image_ref }),
        flavor: Some(ResourceRef {
            id: request.flavor_ref.clone(),
        }),
        addresses,
        metadata: request.metadata.clone(),
        admin_pass: Some(request.admin_pass.clone().unwrap_or_else(|| "generated".to_string())),
    };

    let mut tracked = Tracked::settled(server.clone());
    tracked.transition("BUILD", client.pending_polls, &client.settle_status("server", "ACTIVE"));
    lock(&client.servers).insert(server.id.clone(), tracked);
    Ok(server)
}

pub async fn get_server(client: &MockOpenStackClient, id: &str) -> Result<Server, OpenStackError> {
    client.enter("get_server")?;
    poll_tracked(&client.servers, "server", id)
}

pub async fn rename_server(client: &MockOpenStackClient, id: &str, name: &str) -> Result<Server, OpenStackError> {
    client.enter("rename_server")?;
    let mut servers = lock(&client.servers);
    let entry = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
    entry.value.name = name.to_string();
    Ok(entry.value.clone())
}

pub async fn set_server_metadata(client: &MockOpenStackClient, id: &str, metadata: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, OpenStackError> {
    client.enter("set_server_metadata")?;
    let mut servers = lock(&client.servers);
    let entry = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
    entry.value.metadata = metadata.clone();
    Ok(metadata.clone())
}

pub async fn resize_server(client: &MockOpenStackClient, id: &str, flavor_id: &str) -> Result<(), OpenStackError> {
    client.enter("resize_server")?;
    let mut servers = lock(&client.servers);
    let entry = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
    if entry.value.status != "ACTIVE" {
        return Err(conflict(format!("cannot resize server {id} in status {}", entry.value.status)));
    }
    entry.value.flavor = Some(ResourceRef {
        id: flavor_id.to_string(),
    });
    entry.transition("RESIZE", client.pending_polls, "VERIFY_RESIZE");
    Ok(())
}

pub async fn confirm_resize(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("confirm_resize")?;
    let mut servers = lock(&client.servers);
    let entry = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
    if entry.value.status != "VERIFY_RESIZE" {
        return Err(conflict(format!("server {id} has no resize to confirm")));
    }
    entry.transition("VERIFY_RESIZE", client.pending_polls, "ACTIVE");
    Ok(())
}

pub async fn delete_server(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_server")?;
    let mut servers = lock(&client.servers);
    let entry = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
    entry.remove_after(None, client.delete_polls);
    Ok(())
}

pub async fn get_flavor(client: &MockOpenStackClient, id: &str) -> Result<Flavor, OpenStackError> {
    client.enter("get_flavor")?;
    lock(&client.flavors).get(id).cloned().ok_or_else(|| not_found("flavor", id))
}

pub async fn list_flavors(client: &MockOpenStackClient) -> Result<Vec<Flavor>, OpenStackError> {
    client.enter("list_flavors")?;
    let mut flavors: Vec<Flavor> = lock(&client.flavors).values().cloned().collect();
    flavors.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(flavors)
}

pub async fn get_image(client: &MockOpenStackClient, id: &str) -> Result<Image, OpenStackError> {
    client.enter("get_image")?;
    lock(&client.images).get(id).cloned().ok_or_else(|| not_found("image", id))
}

pub async fn list_images(client: &MockOpenStackClient) -> Result<Vec<Image>, OpenStackError> {
    client.enter("list_images")?;
    let mut images: Vec<Image> = lock(&client.images).values().cloned().collect();
    images.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(images)
}

pub async fn create_keypair(client: &MockOpenStackClient, name: &str, public_key: &str) -> Result<Keypair, OpenStackError> {
    client.enter("create_keypair")?;
    let mut keypairs = lock(&client.keypairs);
    if keypairs.contains_key(name) {
        return Err(conflict(format!("key pair {name} already exists")));
    }
    let keypair = Keypair {
        name: name.to_string(),
        public_key: public_key.to_string(),
        fingerprint: format!("fp:{:02x}", public_key.len() % 256),
        user_id: Some("mock-user".to_string()),
    };
    keypairs.insert(name.to_string(), keypair.clone());
    Ok(keypair)
}

pub async fn get_keypair(client: &MockOpenStackClient, name: &str) -> Result<Keypair, OpenStackError> {
    client.enter("get_keypair")?;
    lock(&client.keypairs).get(name).cloned().ok_or_else(|| not_found("keypair", name))
}

pub async fn delete_keypair(client: &MockOpenStackClient, name: &str) -> Result<(), OpenStackError> {
    client.enter("delete_keypair")?;
    lock(&client.keypairs)
        .remove(name)
        .map(|_| ())
        .ok_or_else(|| not_found("keypair", name))
}

pub async fn create_security_group(client: &MockOpenStackClient, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
    client.enter("create_security_group")?;
    let group = SecurityGroup {
        id: client.next_id("secgroup"),
        name: name.to_string(),
        description: description.to_string(),
        tenant_id: client.tenant_id.clone(),
        rules: Vec::new(),
    };
    lock(&client.security_groups).insert(group.id.clone(), group.clone());
    Ok(group)
}

pub async fn get_security_group(client: &MockOpenStackClient, id: &str) -> Result<SecurityGroup, OpenStackError> {
    client.enter("get_security_group")?;
    lock(&client.security_groups)
        .get(id)
        .cloned()
        .ok_or_else(|| not_found("security group", id))
}

pub async fn update_security_group(client: &MockOpenStackClient, id: &str, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
    client.enter("update_security_group")?;
    let mut groups = lock(&client.security_groups);
    let group = groups.get_mut(id).ok_or_else(|| not_found("security group", id))?;
    group.name = name.to_string();
    group.description = description.to_string();
    Ok(group.clone())
}

pub async fn delete_security_group(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_security_group")?;
    lock(&client.security_groups)
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| not_found("security group", id))
}

pub async fn create_security_group_rule(client: &MockOpenStackClient, rule: &CreateSecurityGroupRule) -> Result<SecurityGroupRule, OpenStackError> {
    client.enter("create_security_group_rule")?;
    let mut groups = lock(&client.security_groups);
    let source = match &rule.group_id {
        Some(group_id) => {
            let source = groups.get(group_id).ok_or_else(|| not_found("security group", group_id))?;
            GroupRef {
                name: Some(source.name.clone()),
                tenant_id: Some(source.tenant_id.clone()),
            }
        }
        None => GroupRef::default(),
    };
    let parent = groups
        .get_mut(&rule.parent_group_id)
        .ok_or_else(|| not_found("security group", &rule.parent_group_id))?;

    let created = SecurityGroupRule {
        id: format!("rule-{}", client.next_number()),
        parent_group_id: rule.parent_group_id.clone(),
        from_port: Some(rule.from_port),
        to_port: Some(rule.to_port),
        ip_protocol: Some(rule.ip_protocol.clone()),
        ip_range: IpRange {
            cidr: rule.cidr.clone(),
        },
        group: source,
    };
    parent.rules.push(created.clone());
    Ok(created)
}

pub async fn delete_security_group_rule(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_security_group_rule")?;
    let mut groups = lock(&client.security_groups);
    for group in groups.values_mut() {
        if let Some(pos) = group.rules.iter().position(|r| r.id == id) {
            group.rules.remove(pos);
            return Ok(());
        }
    }
    Err(not_found("security group rule", id))
}

pub async fn attach_volume(client: &MockOpenStackClient, server_id: &str, volume_id: &str, device: Option<&str>) -> Result<VolumeAttachment, OpenStackError> {
    client.enter("attach_volume")?;
    if !lock(&client.servers).contains_key(server_id) {
        return Err(not_found("server", server_id));
    }
    let mut volumes = lock(&client.volumes);
    let entry = volumes.get_mut(volume_id).ok_or_else(|| not_found("volume", volume_id))?;
    if entry.value.status != "available" && entry.value.status != "in-use" {
        return Err(OpenStackError::Api {
            status: 400,
            message: format!("volume {volume_id} is {}, cannot attach", entry.value.status),
        });
    }

    let device = device.map_or_else(|| "/dev/vdb".to_string(), str::to_string);
    entry.value.attachments.push(VolumeAttachmentInfo {
        id: volume_id.to_string(),
        server_id: server_id.to_string(),
        device: Some(device.clone()),
    });
    entry.transition("attaching", client.pending_polls, "in-use");

    Ok(VolumeAttachment {
        id: volume_id.to_string(),
        server_id: server_id.to_string(),
        volume_id: volume_id.to_string(),
        device: Some(device),
    })
}

pub async fn detach_volume(client: &MockOpenStackClient, server_id: &str, attachment_id: &str) -> Result<(), OpenStackError> {
    client.enter("detach_volume")?;
    let mut volumes = lock(&client.volumes);
    let entry = volumes
        .values_mut()
        .find(|v| {
            v.value
                .attachments
                .iter()
                .any(|a| a.id == attachment_id && a.server_id == server_id)
        })
        .ok_or_else(|| not_found("volume attachment", attachment_id))?;

    entry
        .value
        .attachments
        .retain(|a| !(a.id == attachment_id && a.server_id == server_id));
    let settled = if entry.value.attachments.is_empty() { "available" } else { "in-use" };
    entry.transition("detaching", client.pending_polls, settled);
    Ok(())
}

pub async fn allocate_floating_ip(client: &MockOpenStackClient, pool: &str) -> Result<NovaFloatingIp, OpenStackError> {
    client.enter("allocate_floating_ip")?;
    let n = client.next_number();
    let fip = NovaFloatingIp {
        id: n.to_string(),
        pool: pool.to_string(),
        ip: format!("172.24.4.{}", n % 250 + 2),
        fixed_ip: None,
        instance_id: None,
    };
    lock(&client.nova_floating_ips).insert(fip.id.clone(), fip.clone());
    Ok(fip)
}

pub async fn get_floating_ip(client: &MockOpenStackClient, id: &str) -> Result<NovaFloatingIp, OpenStackError> {
    client.enter("get_floating_ip")?;
    lock(&client.nova_floating_ips)
        .get(id)
        .cloned()
        .ok_or_else(|| not_found("floating IP", id))
}

pub async fn release_floating_ip(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("release_floating_ip")?;
    lock(&client.nova_floating_ips)
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| not_found("floating IP", id))
}

pub async fn associate_floating_ip(client: &MockOpenStackClient, server_id: &str, address: &str) -> Result<(), OpenStackError> {
    client.enter("associate_floating_ip")?;
    let fixed_ip = {
        let servers = lock(&client.servers);
        let server = servers.get(server_id).ok_or_else(|| not_found("server", server_id))?;
        server
            .value
            .addresses
            .values()
            .flatten()
            .find(|a| a.version == 4)
            .map(|a| a.addr.clone())
    };

    let mut fips = lock(&client.nova_floating_ips);
    let fip = fips
        .values_mut()
        .find(|f| f.ip == address)
        .ok_or_else(|| not_found("floating IP", address))?;
    fip.instance_id = Some(server_id.to_string());
    fip.fixed_ip = fixed_ip;
    Ok(())
}

pub async fn disassociate_floating_ip(client: &MockOpenStackClient, server_id: &str, address: &str) -> Result<(), OpenStackError> {
    client.enter("disassociate_floating_ip")?;
    let mut fips = lock(&client.nova_floating_ips);
    let fip = fips
        .values_mut()
        .find(|f| f.ip == address)
        .ok_or_else(|| not_found("floating IP", address))?;
    if fip.instance_id.as_deref() != Some(server_id) {
        return Err(conflict(format!("{address} is not associated with server {server_id}")));
    }
    fip.instance_id = None;
    fip.fixed_ip = None;
    Ok(())
}
