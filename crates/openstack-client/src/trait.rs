//! OpenStackClient trait for mocking
//!
//! This trait abstracts the per-region OpenStack client so that resource
//! handlers can be unit tested against an in-memory mock.

use crate::error::OpenStackError;
use crate::models::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Trait for OpenStack API operations in one region
///
/// Every 404 surfaces as [`OpenStackError::NotFound`].
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait OpenStackClientTrait: Send + Sync {
    /// Region this client is bound to
    fn region(&self) -> &str;

    // Compute: servers
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, OpenStackError>;
    async fn get_server(&self, id: &str) -> Result<Server, OpenStackError>;
    async fn rename_server(&self, id: &str, name: &str) -> Result<Server, OpenStackError>;
    async fn set_server_metadata(&self, id: &str, metadata: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, OpenStackError>;
    async fn resize_server(&self, id: &str, flavor_id: &str) -> Result<(), OpenStackError>;
    async fn confirm_resize(&self, id: &str) -> Result<(), OpenStackError>;
    async fn delete_server(&self, id: &str) -> Result<(), OpenStackError>;

    // Compute: flavors and images
    async fn get_flavor(&self, id: &str) -> Result<Flavor, OpenStackError>;
    async fn list_flavors(&self) -> Result<Vec<Flavor>, OpenStackError>;
    async fn get_image(&self, id: &str) -> Result<Image, OpenStackError>;
    async fn list_images(&self) -> Result<Vec<Image>, OpenStackError>;

    // Compute: keypairs
    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair, OpenStackError>;
    async fn get_keypair(&self, name: &str) -> Result<Keypair, OpenStackError>;
    async fn delete_keypair(&self, name: &str) -> Result<(), OpenStackError>;

    // Compute: security groups
    async fn create_security_group(&self, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError>;
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, OpenStackError>;
    async fn update_security_group(&self, id: &str, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError>;
    async fn delete_security_group(&self, id: &str) -> Result<(), OpenStackError>;
    async fn create_security_group_rule(&self, rule: &CreateSecurityGroupRule) -> Result<SecurityGroupRule, OpenStackError>;
    async fn delete_security_group_rule(&self, id: &str) -> Result<(), OpenStackError>;

    // Compute: volume attachments
    async fn attach_volume(&self, server_id: &str, volume_id: &str, device: Option<&str>) -> Result<VolumeAttachment, OpenStackError>;
    async fn detach_volume(&self, server_id: &str, attachment_id: &str) -> Result<(), OpenStackError>;

    // Compute: nova-network floating IPs
    async fn allocate_floating_ip(&self, pool: &str) -> Result<NovaFloatingIp, OpenStackError>;
    async fn get_floating_ip(&self, id: &str) -> Result<NovaFloatingIp, OpenStackError>;
    async fn release_floating_ip(&self, id: &str) -> Result<(), OpenStackError>;
    async fn associate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError>;
    async fn disassociate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError>;

    // Block storage
    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume, OpenStackError>;
    async fn get_volume(&self, id: &str) -> Result<Volume, OpenStackError>;
    async fn update_volume(&self, id: &str, request: &UpdateVolumeRequest) -> Result<Volume, OpenStackError>;
    async fn delete_volume(&self, id: &str) -> Result<(), OpenStackError>;

    // Network: networks and subnets
    async fn create_network(&self, request: &CreateNetworkRequest) -> Result<Network, OpenStackError>;
    async fn get_network(&self, id: &str) -> Result<Network, OpenStackError>;
    async fn update_network(&self, id: &str, request: &UpdateNetworkRequest) -> Result<Network, OpenStackError>;
    async fn delete_network(&self, id: &str) -> Result<(), OpenStackError>;
    async fn list_external_networks(&self) -> Result<Vec<Network>, OpenStackError>;
    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet, OpenStackError>;
    async fn get_subnet(&self, id: &str) -> Result<Subnet, OpenStackError>;
    async fn update_subnet(&self, id: &str, request: &UpdateSubnetRequest) -> Result<Subnet, OpenStackError>;
    async fn delete_subnet(&self, id: &str) -> Result<(), OpenStackError>;

    // Network: routers and ports
    async fn create_router(&self, request: &CreateRouterRequest) -> Result<Router, OpenStackError>;
    async fn get_router(&self, id: &str) -> Result<Router, OpenStackError>;
    async fn rename_router(&self, id: &str, name: &str) -> Result<Router, OpenStackError>;
    async fn delete_router(&self, id: &str) -> Result<(), OpenStackError>;
    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<RouterInterface, OpenStackError>;
    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<(), OpenStackError>;
    async fn list_ports(&self, device_id: Option<&str>) -> Result<Vec<Port>, OpenStackError>;

    // Network: FWaaS
    async fn create_firewall_rule(&self, request: &CreateFirewallRuleRequest) -> Result<FirewallRule, OpenStackError>;
    async fn get_firewall_rule(&self, id: &str) -> Result<FirewallRule, OpenStackError>;
    async fn delete_firewall_rule(&self, id: &str) -> Result<(), OpenStackError>;
    async fn create_firewall_policy(&self, request: &CreateFirewallPolicyRequest) -> Result<FirewallPolicy, OpenStackError>;
    async fn get_firewall_policy(&self, id: &str) -> Result<FirewallPolicy, OpenStackError>;
    async fn delete_firewall_policy(&self, id: &str) -> Result<(), OpenStackError>;
    async fn create_firewall(&self, request: &CreateFirewallRequest) -> Result<Firewall, OpenStackError>;
    async fn get_firewall(&self, id: &str) -> Result<Firewall, OpenStackError>;
    async fn delete_firewall(&self, id: &str) -> Result<(), OpenStackError>;

    // Network: LBaaS v1
    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, OpenStackError>;
    async fn get_pool(&self, id: &str) -> Result<Pool, OpenStackError>;
    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, OpenStackError>;
    async fn delete_pool(&self, id: &str) -> Result<(), OpenStackError>;
    async fn create_member(&self, request: &CreateMemberRequest) -> Result<Member, OpenStackError>;
    async fn delete_member(&self, id: &str) -> Result<(), OpenStackError>;
    async fn create_health_monitor(&self, request: &CreateHealthMonitorRequest) -> Result<HealthMonitor, OpenStackError>;
    async fn delete_health_monitor(&self, id: &str) -> Result<(), OpenStackError>;
    async fn associate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError>;
    async fn disassociate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError>;
    async fn create_vip(&self, request: &CreateVipRequest) -> Result<Vip, OpenStackError>;
    async fn get_vip(&self, id: &str) -> Result<Vip, OpenStackError>;
    async fn delete_vip(&self, id: &str) -> Result<(), OpenStackError>;

    // Network: floating IPs
    async fn list_network_floating_ips(&self) -> Result<Vec<FloatingIp>, OpenStackError>;
    async fn associate_network_floating_ip(&self, floating_ip_id: &str, port_id: &str) -> Result<FloatingIp, OpenStackError>;
}

/// Hands out per-region clients for one authenticated session
#[async_trait::async_trait]
pub trait CloudConnector: Send + Sync {
    /// Tenant (project) the session is scoped to
    fn tenant_id(&self) -> &str;

    /// Client for the services of `region`
    async fn client_for(&self, region: &str) -> Result<Arc<dyn OpenStackClientTrait>, OpenStackError>;
}
