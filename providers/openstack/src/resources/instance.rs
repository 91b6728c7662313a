//! `openstack_instance`: a Nova server
//!
//! Boot waits `BUILD` -> `ACTIVE`. A flavor change is a resize followed by a
//! confirm, each awaited. Image, networks, user data and the other boot-time
//! fields cannot change in place.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, immutable, non_empty, partial, unique_by_name};
use crate::waits::{self, wait_for};
use openstack_client::{CreateServerRequest, OpenStackClientTrait, Server, ServerAddress, ServerNetwork};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use state_reconciler::TargetStatus;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Network attachment requested at boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceNetwork {
    pub uuid: String,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub fixed_ip: Option<String>,
}

/// Desired server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSpec {
    pub name: String,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub flavor_id: Option<String>,
    #[serde(default)]
    pub flavor_name: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub networks: Vec<InstanceNetwork>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub config_drive: bool,
    #[serde(default)]
    pub admin_pass: Option<String>,
    #[serde(default)]
    pub key_name: Option<String>,
}

/// Observed server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub name: String,
    pub status: String,
    pub image_id: Option<String>,
    pub flavor_id: Option<String>,
    pub key_name: Option<String>,
    pub tenant_id: String,
    pub user_id: String,
    pub created: String,
    pub updated: String,
    pub metadata: BTreeMap<String, String>,
    /// `<pool>_mac`, `<pool>_ipv4` and `<pool>_ipv6` for every address pool
    pub network_info: BTreeMap<String, String>,
    /// SHA-1 hex digest of the user data
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceHandler;

/// SHA-1 hex digest stored instead of the user data itself
pub fn user_data_hash(user_data: &str) -> String {
    hex::encode(Sha1::digest(user_data.as_bytes()))
}

/// Flatten server addresses into per-pool keys. The first address of each
/// kind wins; IPv6 addresses are bracketed.
pub fn network_info(addresses: &BTreeMap<String, Vec<ServerAddress>>) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    for (pool, addrs) in addresses {
        for addr in addrs {
            if let Some(mac) = &addr.mac_addr {
                info.entry(format!("{pool}_mac")).or_insert_with(|| mac.clone());
            }
            match addr.version {
                4 => {
                    info.entry(format!("{pool}_ipv4")).or_insert_with(|| addr.addr.clone());
                }
                6 => {
                    info.entry(format!("{pool}_ipv6")).or_insert_with(|| format!("[{}]", addr.addr));
                }
                other => debug!("Ignoring address {} with IP version {}", addr.addr, other),
            }
        }
    }
    info
}

async fn resolve_image(client: &dyn OpenStackClientTrait, spec: &InstanceSpec) -> Result<String, ProviderError> {
    if let Some(id) = non_empty(spec.image_id.as_deref()) {
        return Ok(id.to_string());
    }
    let name = non_empty(spec.image_name.as_deref()).unwrap_or_default();
    let image = unique_by_name(client.list_images().await?, name, "image", |i| i.name.as_str())?;
    debug!("Image {} resolved to {}", name, image.id);
    Ok(image.id)
}

async fn resolve_flavor(client: &dyn OpenStackClientTrait, spec: &InstanceSpec) -> Result<String, ProviderError> {
    if let Some(id) = non_empty(spec.flavor_id.as_deref()) {
        return Ok(id.to_string());
    }
    let name = non_empty(spec.flavor_name.as_deref()).unwrap_or_default();
    let flavor = unique_by_name(client.list_flavors().await?, name, "flavor", |f| f.name.as_str())?;
    debug!("Flavor {} resolved to {}", name, flavor.id);
    Ok(flavor.id)
}

async fn wait_for_server(client: &Arc<dyn OpenStackClientTrait>, id: &str, pending: &[&str], target: &str) -> Result<Server, ProviderError> {
    let server = wait_for(id, pending, TargetStatus::status(target), waits::COMPUTE, |id| {
        let client = Arc::clone(client);
        async move {
            let server = client.get_server(&id).await?;
            Ok((server.status.clone(), server))
        }
    })
    .await?;
    server.ok_or_else(|| ProviderError::Vanished(format!("server {id}")))
}

fn state_from(server: &Server, spec: &InstanceSpec) -> InstanceState {
    InstanceState {
        name: server.name.clone(),
        status: server.status.clone(),
        image_id: server.image_id().map(str::to_string),
        flavor_id: server.flavor_id().map(str::to_string),
        key_name: server.key_name.clone(),
        tenant_id: server.tenant_id.clone(),
        user_id: server.user_id.clone(),
        created: server.created.clone(),
        updated: server.updated.clone(),
        metadata: server.metadata.clone(),
        network_info: network_info(&server.addresses),
        user_data: spec.user_data.as_deref().map(user_data_hash),
    }
}

#[async_trait::async_trait]
impl ResourceHandler for InstanceHandler {
    type Spec = InstanceSpec;
    type State = InstanceState;

    fn validate(&self, spec: &InstanceSpec) -> Result<(), ProviderError> {
        if spec.name.is_empty() {
            return Err(ProviderError::InvalidResource("instance name is required".to_string()));
        }
        if non_empty(spec.image_id.as_deref()).is_none() && non_empty(spec.image_name.as_deref()).is_none() {
            return Err(ProviderError::InvalidResource(
                "one of image_id or image_name is required".to_string(),
            ));
        }
        if non_empty(spec.flavor_id.as_deref()).is_none() && non_empty(spec.flavor_name.as_deref()).is_none() {
            return Err(ProviderError::InvalidResource(
                "one of flavor_id or flavor_name is required".to_string(),
            ));
        }
        if let Some(network) = spec.networks.iter().find(|n| n.uuid.is_empty()) {
            return Err(ProviderError::InvalidResource(format!(
                "network entry without uuid: {network:?}"
            )));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &InstanceSpec) -> Result<(String, InstanceState), ProviderError> {
        let client = &scope.client;
        let image_ref = resolve_image(client.as_ref(), spec).await?;
        let flavor_ref = resolve_flavor(client.as_ref(), spec).await?;

        let request = CreateServerRequest {
            name: spec.name.clone(),
            image_ref,
            flavor_ref,
            security_groups: spec.security_groups.clone(),
            networks: spec
                .networks
                .iter()
                .map(|n| ServerNetwork {
                    uuid: n.uuid.clone(),
                    port: n.port.clone(),
                    fixed_ip: n.fixed_ip.clone(),
                })
                .collect(),
            user_data: spec.user_data.clone(),
            admin_pass: spec.admin_pass.clone(),
            config_drive: spec.config_drive,
            metadata: spec.metadata.clone(),
            key_name: spec.key_name.clone(),
            availability_zone: spec.availability_zone.clone(),
        };

        let server = client.create_server(&request).await?;
        info!("Server {} ({}) booting, waiting for ACTIVE", server.name, server.id);

        let server = match wait_for_server(client, &server.id, &["BUILD"], "ACTIVE").await {
            Ok(active) => active,
            Err(e) => return Err(partial(&server.id, &state_from(&server, spec), e)),
        };
        Ok((server.id.clone(), state_from(&server, spec)))
    }

    async fn read(&self, scope: &Scope, id: &str, spec: &InstanceSpec, _prior: &InstanceState) -> Result<Option<InstanceState>, ProviderError> {
        let server = found(scope.client.get_server(id).await)?;
        Ok(server.map(|s| state_from(&s, spec)))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &InstanceSpec, new: &InstanceSpec, _prior: &InstanceState) -> Result<InstanceState, ProviderError> {
        immutable("image_id", &old.image_id, &new.image_id)?;
        immutable("image_name", &old.image_name, &new.image_name)?;
        immutable("networks", &old.networks, &new.networks)?;
        immutable("security_groups", &old.security_groups, &new.security_groups)?;
        immutable("user_data", &old.user_data, &new.user_data)?;
        immutable("availability_zone", &old.availability_zone, &new.availability_zone)?;
        immutable("config_drive", &old.config_drive, &new.config_drive)?;
        immutable("admin_pass", &old.admin_pass, &new.admin_pass)?;
        immutable("key_name", &old.key_name, &new.key_name)?;

        let client = &scope.client;

        if old.name != new.name {
            info!("Renaming server {} to {}", id, new.name);
            client.rename_server(id, &new.name).await?;
        }

        if old.metadata != new.metadata {
            info!("Replacing metadata of server {} ({} keys)", id, new.metadata.len());
            client.set_server_metadata(id, &new.metadata).await?;
        }

        if old.flavor_id != new.flavor_id || old.flavor_name != new.flavor_name {
            let flavor_id = resolve_flavor(client.as_ref(), new).await?;
            let current = client.get_server(id).await?;
            if current.flavor_id() == Some(flavor_id.as_str()) {
                debug!("Server {} already has flavor {}", id, flavor_id);
            } else {
                client.resize_server(id, &flavor_id).await?;
                wait_for_server(client, id, &["ACTIVE", "RESIZE"], "VERIFY_RESIZE").await?;
                client.confirm_resize(id).await?;
                wait_for_server(client, id, &["VERIFY_RESIZE"], "ACTIVE").await?;
                info!("Server {} resized to flavor {}", id, flavor_id);
            }
        }

        let server = client.get_server(id).await?;
        Ok(state_from(&server, new))
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &InstanceSpec, _prior: &InstanceState) -> Result<(), ProviderError> {
        let client = &scope.client;
        match client.delete_server(id).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_for(id, &["ACTIVE", "SHUTOFF", "ERROR"], TargetStatus::Deleted, waits::COMPUTE, |id| {
            let client = Arc::clone(client);
            async move {
                let server = client.get_server(&id).await?;
                Ok((server.status.clone(), server))
            }
        })
        .await?;
        Ok(())
    }
}
