//! Neutron v2.0 models: networks, subnets, routers, ports, FWaaS, LBaaS v1
//! and floating IPs.

use serde::{Deserialize, Serialize};

/// Network model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(rename = "router:external", default)]
    pub external: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

/// Parameters for creating a network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub admin_state_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Mutable network fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

/// Subnet model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub ip_version: u8,
    #[serde(default)]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub tenant_id: String,
}

/// Parameters for creating a subnet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubnetRequest {
    pub network_id: String,
    pub name: String,
    pub cidr: String,
    pub ip_version: u8,
    pub enable_dhcp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Mutable subnet fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSubnetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,
}

/// Router external gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalGateway {
    pub network_id: String,
}

/// Router model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub external_gateway_info: Option<ExternalGateway>,
}

/// Parameters for creating a router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRouterRequest {
    pub name: String,
    pub admin_state_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_gateway_info: Option<ExternalGateway>,
}

/// Result of adding an interface to a router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInterface {
    /// Router id
    pub id: String,
    pub subnet_id: String,
    pub port_id: String,
}

/// Fixed IP on a port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

/// Port model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

/// FWaaS firewall rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub protocol: Option<String>,
    pub action: String,
    #[serde(default)]
    pub ip_version: u8,
    #[serde(default)]
    pub source_ip_address: Option<String>,
    #[serde(default)]
    pub destination_ip_address: Option<String>,
    #[serde(default)]
    pub source_port: Option<String>,
    #[serde(default)]
    pub destination_port: Option<String>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub firewall_policy_id: Option<String>,
}

/// Parameters for creating a firewall rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFirewallRuleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub protocol: String,
    pub action: String,
    pub ip_version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
    pub shared: bool,
    pub enabled: bool,
    pub tenant_id: String,
}

/// FWaaS firewall policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub audited: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub firewall_rules: Vec<String>,
    #[serde(default)]
    pub tenant_id: String,
}

/// Parameters for creating a firewall policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFirewallPolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub audited: bool,
    pub shared: bool,
    pub firewall_rules: Vec<String>,
    pub tenant_id: String,
}

/// FWaaS firewall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub firewall_policy_id: String,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
}

/// Parameters for creating a firewall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFirewallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub firewall_policy_id: String,
    pub admin_state_up: bool,
    pub shared: bool,
    pub tenant_id: String,
}

/// LBaaS v1 pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub lb_method: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub health_monitors: Vec<String>,
    #[serde(default)]
    pub vip_id: Option<String>,
    #[serde(default)]
    pub tenant_id: String,
}

/// Parameters for creating a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subnet_id: String,
    pub protocol: String,
    pub lb_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Mutable pool fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePoolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb_method: Option<String>,
}

/// LBaaS v1 pool member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub pool_id: String,
    pub address: String,
    pub protocol_port: u16,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub status: String,
}

/// Parameters for creating a pool member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMemberRequest {
    pub pool_id: String,
    pub address: String,
    pub protocol_port: u16,
    pub admin_state_up: bool,
}

/// LBaaS v1 health monitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMonitor {
    pub id: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub expected_codes: Option<String>,
    #[serde(default)]
    pub admin_state_up: bool,
}

/// Parameters for creating a health monitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHealthMonitorRequest {
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_codes: Option<String>,
}

/// LBaaS v1 VIP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vip {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub subnet_id: String,
    pub protocol: String,
    pub protocol_port: u16,
    pub pool_id: String,
    #[serde(default)]
    pub port_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: String,
}

/// Parameters for creating a VIP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVipRequest {
    pub name: String,
    pub subnet_id: String,
    pub protocol: String,
    pub protocol_port: u16,
    pub pool_id: String,
}

/// Neutron floating IP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub floating_ip_address: String,
    #[serde(default)]
    pub floating_network_id: String,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub fixed_ip_address: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_external_flag() {
        let net: Network = serde_json::from_str(
            r#"{"id": "n-1", "name": "public", "router:external": true, "status": "ACTIVE"}"#,
        )
        .unwrap();
        assert!(net.external);
    }

    #[test]
    fn test_health_monitor_type_renamed() {
        let req = CreateHealthMonitorRequest {
            monitor_type: "HTTP".to_string(),
            delay: 5,
            timeout: 3,
            max_retries: 2,
            ..Default::default()
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["type"], "HTTP");
        assert!(body.get("http_method").is_none());
    }
}
