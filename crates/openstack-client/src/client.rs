//! OpenStack API client
//!
//! [`Cloud`] holds one authenticated Keystone session; [`OpenStackClient`] is
//! the per-region handle that talks to Nova, Cinder and Neutron through the
//! endpoints published in the session's catalog.

use crate::auth::{AuthOptions, Session, authenticate};
use crate::catalog::ServiceKind;
use crate::common::HttpClient;
use crate::error::OpenStackError;
use crate::models::*;
use crate::openstack_trait::{CloudConnector, OpenStackClientTrait};
use base64::Engine as _;
use chrono::Utc;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An authenticated OpenStack cloud
#[derive(Debug, Clone)]
pub struct Cloud {
    client: Client,
    session: Arc<Session>,
}

impl Cloud {
    /// Authenticate with Keystone and keep the session for later per-region clients.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or Keystone rejects the credentials.
    pub async fn connect(opts: &AuthOptions) -> Result<Self, OpenStackError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let session = authenticate(&client, opts).await?;
        if session.is_expired(Utc::now()) {
            warn!(
                "Keystone returned a token for tenant {} that expired at {:?}",
                session.tenant_id, session.expires_at
            );
        }
        Ok(Self {
            client,
            session: Arc::new(session),
        })
    }

    /// The Keystone session
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait::async_trait]
impl CloudConnector for Cloud {
    fn tenant_id(&self) -> &str {
        &self.session.tenant_id
    }

    async fn client_for(&self, region: &str) -> Result<Arc<dyn OpenStackClientTrait>, OpenStackError> {
        Ok(Arc::new(OpenStackClient::new(self.client.clone(), &self.session, region)))
    }
}

/// OpenStack client bound to one region
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    region: String,
    services: HashMap<ServiceKind, HttpClient>,
}

impl OpenStackClient {
    /// Resolve every known service for `region` from the session catalog.
    ///
    /// Services missing from the catalog are skipped; calling one of their
    /// operations returns [`OpenStackError::EndpointNotFound`].
    #[must_use]
    pub fn new(client: Client, session: &Session, region: &str) -> Self {
        let mut services = HashMap::new();
        for kind in ServiceKind::ALL {
            match kind.resolve(&session.catalog, region) {
                Ok(endpoint) => {
                    debug!("{} endpoint for {}: {}", kind, region, endpoint.url);
                    services.insert(kind, HttpClient::new(client.clone(), endpoint.url, session.token.clone()));
                }
                Err(e) => debug!("{}", e),
            }
        }

        info!("OpenStack client ready for region {} ({} services)", region, services.len());

        Self {
            region: region.to_string(),
            services,
        }
    }

    fn service(&self, kind: ServiceKind) -> Result<&HttpClient, OpenStackError> {
        self.services.get(&kind).ok_or_else(|| OpenStackError::EndpointNotFound {
            service: kind.catalog_type().to_string(),
            region: self.region.clone(),
        })
    }

    fn compute(&self) -> Result<&HttpClient, OpenStackError> {
        self.service(ServiceKind::Compute)
    }

    fn volume(&self) -> Result<&HttpClient, OpenStackError> {
        self.service(ServiceKind::BlockStorage)
    }

    fn network(&self) -> Result<&HttpClient, OpenStackError> {
        self.service(ServiceKind::Network)
    }
}

/// Pull the resource out of its `{"<key>": {...}}` envelope.
fn unwrap_key<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T, OpenStackError> {
    let inner = body.get_mut(key).map(Value::take).ok_or_else(|| OpenStackError::Api {
        status: 200,
        message: format!("response has no \"{key}\" field"),
    })?;
    Ok(serde_json::from_value(inner)?)
}

fn wrap<T: serde::Serialize>(key: &str, value: &T) -> Result<Value, OpenStackError> {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(Value::Object(body))
}

pub(crate) fn server_create_body(request: &CreateServerRequest) -> Value {
    let mut server = json!({
        "name": request.name,
        "imageRef": request.image_ref,
        "flavorRef": request.flavor_ref,
    });

    if !request.security_groups.is_empty() {
        server["security_groups"] = request
            .security_groups
            .iter()
            .map(|name| json!({ "name": name }))
            .collect();
    }
    if !request.networks.is_empty() {
        server["networks"] = json!(request.networks);
    }
    if let Some(user_data) = &request.user_data {
        server["user_data"] = json!(STANDARD.encode(user_data.as_bytes()));
    }
    if let Some(admin_pass) = &request.admin_pass {
        server["adminPass"] = json!(admin_pass);
    }
    if request.config_drive {
        server["config_drive"] = json!(true);
    }
    if !request.metadata.is_empty() {
        server["metadata"] = json!(request.metadata);
    }
    if let Some(key_name) = &request.key_name {
        server["key_name"] = json!(key_name);
    }
    if let Some(zone) = &request.availability_zone {
        server["availability_zone"] = json!(zone);
    }

    json!({ "server": server })
}

#[async_trait::async_trait]
impl OpenStackClientTrait for OpenStackClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, OpenStackError> {
        info!("Booting server {} (image {}, flavor {})", request.name, request.image_ref, request.flavor_ref);
        let body: Value = self.compute()?.post("servers", &server_create_body(request)).await?;
        unwrap_key(body, "server")
    }

    async fn get_server(&self, id: &str) -> Result<Server, OpenStackError> {
        let body: Value = self.compute()?.get(&format!("servers/{id}")).await?;
        unwrap_key(body, "server")
    }

    async fn rename_server(&self, id: &str, name: &str) -> Result<Server, OpenStackError> {
        let body: Value = self
            .compute()?
            .put(&format!("servers/{id}"), &json!({ "server": { "name": name } }))
            .await?;
        unwrap_key(body, "server")
    }

    async fn set_server_metadata(&self, id: &str, metadata: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, OpenStackError> {
        let body: Value = self
            .compute()?
            .put(&format!("servers/{id}/metadata"), &json!({ "metadata": metadata }))
            .await?;
        unwrap_key(body, "metadata")
    }

    async fn resize_server(&self, id: &str, flavor_id: &str) -> Result<(), OpenStackError> {
        info!("Resizing server {} to flavor {}", id, flavor_id);
        self.compute()?
            .post_action(&format!("servers/{id}/action"), &json!({ "resize": { "flavorRef": flavor_id } }))
            .await
    }

    async fn confirm_resize(&self, id: &str) -> Result<(), OpenStackError> {
        self.compute()?
            .post_action(&format!("servers/{id}/action"), &json!({ "confirmResize": null }))
            .await
    }

    async fn delete_server(&self, id: &str) -> Result<(), OpenStackError> {
        info!("Deleting server {}", id);
        self.compute()?.delete(&format!("servers/{id}")).await
    }

    async fn get_flavor(&self, id: &str) -> Result<Flavor, OpenStackError> {
        let body: Value = self.compute()?.get(&format!("flavors/{id}")).await?;
        unwrap_key(body, "flavor")
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>, OpenStackError> {
        let body: Value = self.compute()?.get("flavors/detail").await?;
        unwrap_key(body, "flavors")
    }

    async fn get_image(&self, id: &str) -> Result<Image, OpenStackError> {
        let body: Value = self.compute()?.get(&format!("images/{id}")).await?;
        unwrap_key(body, "image")
    }

    async fn list_images(&self) -> Result<Vec<Image>, OpenStackError> {
        let body: Value = self.compute()?.get("images/detail").await?;
        unwrap_key(body, "images")
    }

    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair, OpenStackError> {
        let body: Value = self
            .compute()?
            .post("os-keypairs", &json!({ "keypair": { "name": name, "public_key": public_key } }))
            .await?;
        unwrap_key(body, "keypair")
    }

    async fn get_keypair(&self, name: &str) -> Result<Keypair, OpenStackError> {
        let path = format!("os-keypairs/{}", urlencoding::encode(name));
        let body: Value = self.compute()?.get(&path).await?;
        unwrap_key(body, "keypair")
    }

    async fn delete_keypair(&self, name: &str) -> Result<(), OpenStackError> {
        self.compute()?.delete(&format!("os-keypairs/{}", urlencoding::encode(name))).await
    }

    async fn create_security_group(&self, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
        let body: Value = self
            .compute()?
            .post(
                "os-security-groups",
                &json!({ "security_group": { "name": name, "description": description } }),
            )
            .await?;
        unwrap_key(body, "security_group")
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, OpenStackError> {
        let body: Value = self.compute()?.get(&format!("os-security-groups/{id}")).await?;
        unwrap_key(body, "security_group")
    }

    async fn update_security_group(&self, id: &str, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
        let body: Value = self
            .compute()?
            .put(
                &format!("os-security-groups/{id}"),
                &json!({ "security_group": { "name": name, "description": description } }),
            )
            .await?;
        unwrap_key(body, "security_group")
    }

    async fn delete_security_group(&self, id: &str) -> Result<(), OpenStackError> {
        self.compute()?.delete(&format!("os-security-groups/{id}")).await
    }

    async fn create_security_group_rule(&self, rule: &CreateSecurityGroupRule) -> Result<SecurityGroupRule, OpenStackError> {
        let body: Value = self
            .compute()?
            .post("os-security-group-rules", &wrap("security_group_rule", rule)?)
            .await?;
        unwrap_key(body, "security_group_rule")
    }

    async fn delete_security_group_rule(&self, id: &str) -> Result<(), OpenStackError> {
        self.compute()?.delete(&format!("os-security-group-rules/{id}")).await
    }

    async fn attach_volume(&self, server_id: &str, volume_id: &str, device: Option<&str>) -> Result<VolumeAttachment, OpenStackError> {
        info!("Attaching volume {} to server {}", volume_id, server_id);
        let mut attachment = json!({ "volumeId": volume_id });
        if let Some(device) = device {
            attachment["device"] = json!(device);
        }
        let body: Value = self
            .compute()?
            .post(
                &format!("servers/{server_id}/os-volume_attachments"),
                &json!({ "volumeAttachment": attachment }),
            )
            .await?;
        unwrap_key(body, "volumeAttachment")
    }

    async fn detach_volume(&self, server_id: &str, attachment_id: &str) -> Result<(), OpenStackError> {
        info!("Detaching attachment {} from server {}", attachment_id, server_id);
        self.compute()?
            .delete(&format!("servers/{server_id}/os-volume_attachments/{attachment_id}"))
            .await
    }

    async fn allocate_floating_ip(&self, pool: &str) -> Result<NovaFloatingIp, OpenStackError> {
        let body: Value = self.compute()?.post("os-floating-ips", &json!({ "pool": pool })).await?;
        let fip: NovaFloatingIp = unwrap_key(body, "floating_ip")?;
        if fip.ip.is_empty() {
            return Err(OpenStackError::Api {
                status: 200,
                message: format!("floating IP allocated from {pool} has no address"),
            });
        }
        Ok(fip)
    }

    async fn get_floating_ip(&self, id: &str) -> Result<NovaFloatingIp, OpenStackError> {
        let body: Value = self.compute()?.get(&format!("os-floating-ips/{id}")).await?;
        unwrap_key(body, "floating_ip")
    }

    async fn release_floating_ip(&self, id: &str) -> Result<(), OpenStackError> {
        self.compute()?.delete(&format!("os-floating-ips/{id}")).await
    }

    async fn associate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError> {
        info!("Associating {} with server {}", address, server_id);
        self.compute()?
            .post_action(
                &format!("servers/{server_id}/action"),
                &json!({ "addFloatingIp": { "address": address } }),
            )
            .await
    }

    async fn disassociate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError> {
        info!("Disassociating {} from server {}", address, server_id);
        self.compute()?
            .post_action(
                &format!("servers/{server_id}/action"),
                &json!({ "removeFloatingIp": { "address": address } }),
            )
            .await
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume, OpenStackError> {
        info!("Creating volume {} ({} GB)", request.name, request.size);
        let body: Value = self.volume()?.post("volumes", &wrap("volume", request)?).await?;
        unwrap_key(body, "volume")
    }

    async fn get_volume(&self, id: &str) -> Result<Volume, OpenStackError> {
        let body: Value = self.volume()?.get(&format!("volumes/{id}")).await?;
        unwrap_key(body, "volume")
    }

    async fn update_volume(&self, id: &str, request: &UpdateVolumeRequest) -> Result<Volume, OpenStackError> {
        let body: Value = self.volume()?.put(&format!("volumes/{id}"), &wrap("volume", request)?).await?;
        unwrap_key(body, "volume")
    }

    async fn delete_volume(&self, id: &str) -> Result<(), OpenStackError> {
        info!("Deleting volume {}", id);
        self.volume()?.delete(&format!("volumes/{id}")).await
    }

    async fn create_network(&self, request: &CreateNetworkRequest) -> Result<Network, OpenStackError> {
        let body: Value = self.network()?.post("networks", &wrap("network", request)?).await?;
        unwrap_key(body, "network")
    }

    async fn get_network(&self, id: &str) -> Result<Network, OpenStackError> {
        let body: Value = self.network()?.get(&format!("networks/{id}")).await?;
        unwrap_key(body, "network")
    }

    async fn update_network(&self, id: &str, request: &UpdateNetworkRequest) -> Result<Network, OpenStackError> {
        let body: Value = self.network()?.put(&format!("networks/{id}"), &wrap("network", request)?).await?;
        unwrap_key(body, "network")
    }

    async fn delete_network(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("networks/{id}")).await
    }

    async fn list_external_networks(&self) -> Result<Vec<Network>, OpenStackError> {
        let query = HttpClient::build_query_string(&[("router:external", "True")]);
        let body: Value = self.network()?.get(&format!("networks?{query}")).await?;
        unwrap_key(body, "networks")
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet, OpenStackError> {
        let body: Value = self.network()?.post("subnets", &wrap("subnet", request)?).await?;
        unwrap_key(body, "subnet")
    }

    async fn get_subnet(&self, id: &str) -> Result<Subnet, OpenStackError> {
        let body: Value = self.network()?.get(&format!("subnets/{id}")).await?;
        unwrap_key(body, "subnet")
    }

    async fn update_subnet(&self, id: &str, request: &UpdateSubnetRequest) -> Result<Subnet, OpenStackError> {
        let body: Value = self.network()?.put(&format!("subnets/{id}"), &wrap("subnet", request)?).await?;
        unwrap_key(body, "subnet")
    }

    async fn delete_subnet(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("subnets/{id}")).await
    }

    async fn create_router(&self, request: &CreateRouterRequest) -> Result<Router, OpenStackError> {
        let body: Value = self.network()?.post("routers", &wrap("router", request)?).await?;
        unwrap_key(body, "router")
    }

    async fn get_router(&self, id: &str) -> Result<Router, OpenStackError> {
        let body: Value = self.network()?.get(&format!("routers/{id}")).await?;
        unwrap_key(body, "router")
    }

    async fn rename_router(&self, id: &str, name: &str) -> Result<Router, OpenStackError> {
        let body: Value = self
            .network()?
            .put(&format!("routers/{id}"), &json!({ "router": { "name": name } }))
            .await?;
        unwrap_key(body, "router")
    }

    async fn delete_router(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("routers/{id}")).await
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<RouterInterface, OpenStackError> {
        self.network()?
            .put(
                &format!("routers/{router_id}/add_router_interface"),
                &json!({ "subnet_id": subnet_id }),
            )
            .await
    }

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<(), OpenStackError> {
        let _: Value = self
            .network()?
            .put(
                &format!("routers/{router_id}/remove_router_interface"),
                &json!({ "port_id": port_id }),
            )
            .await?;
        Ok(())
    }

    async fn list_ports(&self, device_id: Option<&str>) -> Result<Vec<Port>, OpenStackError> {
        let path = match device_id {
            Some(device_id) => format!("ports?{}", HttpClient::build_query_string(&[("device_id", device_id)])),
            None => "ports".to_string(),
        };
        let body: Value = self.network()?.get(&path).await?;
        unwrap_key(body, "ports")
    }

    async fn create_firewall_rule(&self, request: &CreateFirewallRuleRequest) -> Result<FirewallRule, OpenStackError> {
        let body: Value = self
            .network()?
            .post("fw/firewall_rules", &wrap("firewall_rule", request)?)
            .await?;
        unwrap_key(body, "firewall_rule")
    }

    async fn get_firewall_rule(&self, id: &str) -> Result<FirewallRule, OpenStackError> {
        let body: Value = self.network()?.get(&format!("fw/firewall_rules/{id}")).await?;
        unwrap_key(body, "firewall_rule")
    }

    async fn delete_firewall_rule(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("fw/firewall_rules/{id}")).await
    }

    async fn create_firewall_policy(&self, request: &CreateFirewallPolicyRequest) -> Result<FirewallPolicy, OpenStackError> {
        let body: Value = self
            .network()?
            .post("fw/firewall_policies", &wrap("firewall_policy", request)?)
            .await?;
        unwrap_key(body, "firewall_policy")
    }

    async fn get_firewall_policy(&self, id: &str) -> Result<FirewallPolicy, OpenStackError> {
        let body: Value = self.network()?.get(&format!("fw/firewall_policies/{id}")).await?;
        unwrap_key(body, "firewall_policy")
    }

    async fn delete_firewall_policy(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("fw/firewall_policies/{id}")).await
    }

    async fn create_firewall(&self, request: &CreateFirewallRequest) -> Result<Firewall, OpenStackError> {
        let body: Value = self.network()?.post("fw/firewalls", &wrap("firewall", request)?).await?;
        unwrap_key(body, "firewall")
    }

    async fn get_firewall(&self, id: &str) -> Result<Firewall, OpenStackError> {
        let body: Value = self.network()?.get(&format!("fw/firewalls/{id}")).await?;
        unwrap_key(body, "firewall")
    }

    async fn delete_firewall(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("fw/firewalls/{id}")).await
    }

    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, OpenStackError> {
        let body: Value = self.network()?.post("lb/pools", &wrap("pool", request)?).await?;
        unwrap_key(body, "pool")
    }

    async fn get_pool(&self, id: &str) -> Result<Pool, OpenStackError> {
        let body: Value = self.network()?.get(&format!("lb/pools/{id}")).await?;
        unwrap_key(body, "pool")
    }

    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, OpenStackError> {
        let body: Value = self.network()?.put(&format!("lb/pools/{id}"), &wrap("pool", request)?).await?;
        unwrap_key(body, "pool")
    }

    async fn delete_pool(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("lb/pools/{id}")).await
    }

    async fn create_member(&self, request: &CreateMemberRequest) -> Result<Member, OpenStackError> {
        let body: Value = self.network()?.post("lb/members", &wrap("member", request)?).await?;
        unwrap_key(body, "member")
    }

    async fn delete_member(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("lb/members/{id}")).await
    }

    async fn create_health_monitor(&self, request: &CreateHealthMonitorRequest) -> Result<HealthMonitor, OpenStackError> {
        let body: Value = self
            .network()?
            .post("lb/health_monitors", &wrap("health_monitor", request)?)
            .await?;
        unwrap_key(body, "health_monitor")
    }

    async fn delete_health_monitor(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("lb/health_monitors/{id}")).await
    }

    async fn associate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
        let _: Value = self
            .network()?
            .post(
                &format!("lb/pools/{pool_id}/health_monitors"),
                &json!({ "health_monitor": { "id": monitor_id } }),
            )
            .await?;
        Ok(())
    }

    async fn disassociate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
        self.network()?
            .delete(&format!("lb/pools/{pool_id}/health_monitors/{monitor_id}"))
            .await
    }

    async fn create_vip(&self, request: &CreateVipRequest) -> Result<Vip, OpenStackError> {
        let body: Value = self.network()?.post("lb/vips", &wrap("vip", request)?).await?;
        unwrap_key(body, "vip")
    }

    async fn get_vip(&self, id: &str) -> Result<Vip, OpenStackError> {
        let body: Value = self.network()?.get(&format!("lb/vips/{id}")).await?;
        unwrap_key(body, "vip")
    }

    async fn delete_vip(&self, id: &str) -> Result<(), OpenStackError> {
        self.network()?.delete(&format!("lb/vips/{id}")).await
    }

    async fn list_network_floating_ips(&self) -> Result<Vec<FloatingIp>, OpenStackError> {
        let body: Value = self.network()?.get("floatingips").await?;
        unwrap_key(body, "floatingips")
    }

    async fn associate_network_floating_ip(&self, floating_ip_id: &str, port_id: &str) -> Result<FloatingIp, OpenStackError> {
        let body: Value = self
            .network()?
            .put(
                &format!("floatingips/{floating_ip_id}"),
                &json!({ "floatingip": { "port_id": port_id } }),
            )
            .await?;
        unwrap_key(body, "floatingip")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, Endpoint, ServiceCatalog};

    fn session() -> Session {
        Session {
            token: "tok".to_string(),
            tenant_id: "t-1".to_string(),
            expires_at: None,
            catalog: ServiceCatalog {
                entries: vec![CatalogEntry {
                    service_type: "compute".to_string(),
                    endpoints: vec![Endpoint {
                        region: "RegionOne".to_string(),
                        url: "https://nova/v2/t-1".to_string(),
                    }],
                }],
            },
        }
    }

    #[test]
    fn test_server_body_encodes_user_data() {
        let request = CreateServerRequest {
            name: "web".to_string(),
            image_ref: "img-1".to_string(),
            flavor_ref: "2".to_string(),
            security_groups: vec!["default".to_string()],
            user_data: Some("#!/bin/sh\necho hi\n".to_string()),
            key_name: Some("deployer".to_string()),
            ..Default::default()
        };
        let body = server_create_body(&request);
        let server = &body["server"];
        assert_eq!(server["imageRef"], "img-1");
        assert_eq!(server["security_groups"][0]["name"], "default");
        assert_eq!(server["user_data"], STANDARD.encode("#!/bin/sh\necho hi\n"));
        assert_eq!(server["key_name"], "deployer");
        assert!(server.get("metadata").is_none());
        assert!(server.get("config_drive").is_none());
    }

    #[test]
    fn test_metadata_sent_whole() {
        let mut metadata = BTreeMap::new();
        metadata.insert("role".to_string(), "web".to_string());
        let request = CreateServerRequest {
            metadata,
            ..Default::default()
        };
        let body = server_create_body(&request);
        assert_eq!(body["server"]["metadata"]["role"], "web");
    }

    #[test]
    fn test_unwrap_key() {
        let flavor: Flavor = unwrap_key(json!({"flavor": {"id": "1", "name": "m1.tiny"}}), "flavor").unwrap();
        assert_eq!(flavor.name, "m1.tiny");
        assert!(unwrap_key::<Flavor>(json!({"image": {}}), "flavor").is_err());
    }

    #[tokio::test]
    async fn test_missing_service_reports_endpoint_not_found() {
        let client = OpenStackClient::new(Client::new(), &session(), "RegionOne");
        let err = client.get_volume("vol-1").await.unwrap_err();
        assert!(matches!(err, OpenStackError::EndpointNotFound { ref service, .. } if service == "volume"));
        assert_eq!(client.region(), "RegionOne");
    }
}
