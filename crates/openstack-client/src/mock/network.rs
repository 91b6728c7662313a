//! Network operations for MockOpenStackClient
//!
//! Handles networks, subnets, routers, ports, FWaaS, LBaaS v1 and neutron
//! floating IPs

use super::{MockOpenStackClient, Tracked, conflict, lock, not_found, poll_tracked};
use crate::error::OpenStackError;
use crate::models::*;

pub async fn create_network(client: &MockOpenStackClient, request: &CreateNetworkRequest) -> Result<Network, OpenStackError> {
    client.enter("create_network")?;
    let network = Network {
        id: client.next_id("network"),
        name: request.name.clone(),
        admin_state_up: request.admin_state_up,
        shared: request.shared.unwrap_or(false),
        status: "ACTIVE".to_string(),
        tenant_id: request.tenant_id.clone().unwrap_or_else(|| client.tenant_id.clone()),
        external: false,
        subnets: Vec::new(),
    };
    lock(&client.networks).insert(network.id.clone(), network.clone());
    Ok(network)
}

pub async fn get_network(client: &MockOpenStackClient, id: &str) -> Result<Network, OpenStackError> {
    client.enter("get_network")?;
    lock(&client.networks).get(id).cloned().ok_or_else(|| not_found("network", id))
}

pub async fn update_network(client: &MockOpenStackClient, id: &str, request: &UpdateNetworkRequest) -> Result<Network, OpenStackError> {
    client.enter("update_network")?;
    let mut networks = lock(&client.networks);
    let network = networks.get_mut(id).ok_or_else(|| not_found("network", id))?;
    if let Some(name) = &request.name {
        network.name = name.clone();
    }
    if let Some(admin_state_up) = request.admin_state_up {
        network.admin_state_up = admin_state_up;
    }
    Ok(network.clone())
}

pub async fn delete_network(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_network")?;
    lock(&client.subnets).retain(|_, s| s.network_id != id);
    lock(&client.networks)
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| not_found("network", id))
}

pub async fn list_external_networks(client: &MockOpenStackClient) -> Result<Vec<Network>, OpenStackError> {
    client.enter("list_external_networks")?;
    let mut networks: Vec<Network> = lock(&client.networks).values().filter(|n| n.external).cloned().collect();
    networks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(networks)
}

pub async fn create_subnet(client: &MockOpenStackClient, request: &CreateSubnetRequest) -> Result<Subnet, OpenStackError> {
    client.enter("create_subnet")?;
    let mut networks = lock(&client.networks);
    let network = networks
        .get_mut(&request.network_id)
        .ok_or_else(|| not_found("network", &request.network_id))?;

    let subnet = Subnet {
        id: client.next_id("subnet"),
        name: request.name.clone(),
        network_id: request.network_id.clone(),
        cidr: request.cidr.clone(),
        ip_version: request.ip_version,
        enable_dhcp: request.enable_dhcp,
        gateway_ip: request.gateway_ip.clone(),
        tenant_id: request.tenant_id.clone().unwrap_or_else(|| client.tenant_id.clone()),
    };
    network.subnets.push(subnet.id.clone());
    lock(&client.subnets).insert(subnet.id.clone(), subnet.clone());
    Ok(subnet)
}

pub async fn get_subnet(client: &MockOpenStackClient, id: &str) -> Result<Subnet, OpenStackError> {
    client.enter("get_subnet")?;
    lock(&client.subnets).get(id).cloned().ok_or_else(|| not_found("subnet", id))
}

pub async fn update_subnet(client: &MockOpenStackClient, id: &str, request: &UpdateSubnetRequest) -> Result<Subnet, OpenStackError> {
    client.enter("update_subnet")?;
    let mut subnets = lock(&client.subnets);
    let subnet = subnets.get_mut(id).ok_or_else(|| not_found("subnet", id))?;
    if let Some(name) = &request.name {
        subnet.name = name.clone();
    }
    if let Some(enable_dhcp) = request.enable_dhcp {
        subnet.enable_dhcp = enable_dhcp;
    }
    Ok(subnet.clone())
}

pub async fn delete_subnet(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_subnet")?;
    let subnet = lock(&client.subnets).remove(id).ok_or_else(|| not_found("subnet", id))?;
    if let Some(network) = lock(&client.networks).get_mut(&subnet.network_id) {
        network.subnets.retain(|s| s != id);
    }
    Ok(())
}

pub async fn create_router(client: &MockOpenStackClient, request: &CreateRouterRequest) -> Result<Router, OpenStackError> {
    client.enter("create_router")?;
    if let Some(gateway) = &request.external_gateway_info {
        let networks = lock(&client.networks);
        let external = networks.get(&gateway.network_id).is_some_and(|n| n.external);
        if !external {
            return Err(OpenStackError::Api {
                status: 400,
                message: format!("network {} is not external", gateway.network_id),
            });
        }
    }

    let router = Router {
        id: client.next_id("router"),
        name: request.name.clone(),
        status: "BUILD".to_string(),
        admin_state_up: request.admin_state_up,
        tenant_id: client.tenant_id.clone(),
        external_gateway_info: request.external_gateway_info.clone(),
    };
    let mut tracked = Tracked::settled(router.clone());
    tracked.transition("BUILD", client.pending_polls, &client.settle_status("router", "ACTIVE"));
    lock(&client.routers).insert(router.id.clone(), tracked);
    Ok(router)
}

pub async fn get_router(client: &MockOpenStackClient, id: &str) -> Result<Router, OpenStackError> {
    client.enter("get_router")?;
    poll_tracked(&client.routers, "router", id)
}

pub async fn rename_router(client: &MockOpenStackClient, id: &str, name: &str) -> Result<Router, OpenStackError> {
    client.enter("rename_router")?;
    let mut routers = lock(&client.routers);
    let entry = routers.get_mut(id).ok_or_else(|| not_found("router", id))?;
    entry.value.name = name.to_string();
    Ok(entry.value.clone())
}

pub async fn delete_router(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_router")?;
    if lock(&client.ports).values().any(|p| p.device_id == id) {
        return Err(conflict(format!("router {id} still has ports")));
    }
    let mut routers = lock(&client.routers);
    let entry = routers.get_mut(id).ok_or_else(|| not_found("router", id))?;
    entry.remove_after(None, client.delete_polls);
    Ok(())
}

pub async fn add_router_interface(client: &MockOpenStackClient, router_id: &str, subnet_id: &str) -> Result<RouterInterface, OpenStackError> {
    client.enter("add_router_interface")?;
    if !lock(&client.routers).contains_key(router_id) {
        return Err(not_found("router", router_id));
    }
    let subnet = lock(&client.subnets)
        .get(subnet_id)
        .cloned()
        .ok_or_else(|| not_found("subnet", subnet_id))?;

    let port = Port {
        id: client.next_id("port"),
        network_id: subnet.network_id.clone(),
        device_id: router_id.to_string(),
        device_owner: "network:router_interface".to_string(),
        status: "ACTIVE".to_string(),
        fixed_ips: vec![FixedIp {
            subnet_id: subnet_id.to_string(),
            ip_address: subnet.gateway_ip.clone().unwrap_or_default(),
        }],
    };
    let interface = RouterInterface {
        id: router_id.to_string(),
        subnet_id: subnet_id.to_string(),
        port_id: port.id.clone(),
    };
    lock(&client.ports).insert(port.id.clone(), port);
    Ok(interface)
}

pub async fn remove_router_interface(client: &MockOpenStackClient, router_id: &str, port_id: &str) -> Result<(), OpenStackError> {
    client.enter("remove_router_interface")?;
    let mut ports = lock(&client.ports);
    match ports.get(port_id) {
        Some(port) if port.device_id == router_id => {
            ports.remove(port_id);
            Ok(())
        }
        _ => Err(not_found("router interface", port_id)),
    }
}

pub async fn list_ports(client: &MockOpenStackClient, device_id: Option<&str>) -> Result<Vec<Port>, OpenStackError> {
    client.enter("list_ports")?;
    let mut ports: Vec<Port> = lock(&client.ports)
        .values()
        .filter(|p| device_id.is_none_or(|d| p.device_id == d))
        .cloned()
        .collect();
    ports.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(ports)
}

pub async fn create_firewall_rule(client: &MockOpenStackClient, request: &CreateFirewallRuleRequest) -> Result<FirewallRule, OpenStackError> {
    client.enter("create_firewall_rule")?;
    let rule = FirewallRule {
        id: client.next_id("fw-rule"),
        name: request.name.clone().unwrap_or_default(),
        description: request.description.clone().unwrap_or_default(),
        protocol: Some(request.protocol.clone()),
        action: request.action.clone(),
        ip_version: request.ip_version,
        source_ip_address: request.source_ip_address.clone(),
        destination_ip_address: request.destination_ip_address.clone(),
        source_port: request.source_port.clone(),
        destination_port: request.destination_port.clone(),
        shared: request.shared,
        enabled: request.enabled,
        tenant_id: request.tenant_id.clone(),
        firewall_policy_id: None,
    };
    lock(&client.firewall_rules).insert(rule.id.clone(), rule.clone());
    Ok(rule)
}

pub async fn get_firewall_rule(client: &MockOpenStackClient, id: &str) -> Result<FirewallRule, OpenStackError> {
    client.enter("get_firewall_rule")?;
    lock(&client.firewall_rules)
        .get(id)
        .cloned()
        .ok_or_else(|| not_found("firewall rule", id))
}

pub async fn delete_firewall_rule(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_firewall_rule")?;
    let mut rules = lock(&client.firewall_rules);
    let rule = rules.get(id).ok_or_else(|| not_found("firewall rule", id))?;
    if let Some(policy) = &rule.firewall_policy_id {
        return Err(conflict(format!("firewall rule {id} is in use by policy {policy}")));
    }
    rules.remove(id);
    Ok(())
}

pub async fn create_firewall_policy(client: &MockOpenStackClient, request: &CreateFirewallPolicyRequest) -> Result<FirewallPolicy, OpenStackError> {
    client.enter("create_firewall_policy")?;
    let id = client.next_id("fw-policy");
    {
        let mut rules = lock(&client.firewall_rules);
        for rule_id in &request.firewall_rules {
            let rule = rules.get_mut(rule_id).ok_or_else(|| not_found("firewall rule", rule_id))?;
            rule.firewall_policy_id = Some(id.clone());
        }
    }

    let policy = FirewallPolicy {
        id,
        name: request.name.clone().unwrap_or_default(),
        description: request.description.clone().unwrap_or_default(),
        audited: request.audited,
        shared: request.shared,
        firewall_rules: request.firewall_rules.clone(),
        tenant_id: request.tenant_id.clone(),
    };
    lock(&client.firewall_policies).insert(policy.id.clone(), policy.clone());
    Ok(policy)
}

pub async fn get_firewall_policy(client: &MockOpenStackClient, id: &str) -> Result<FirewallPolicy, OpenStackError> {
    client.enter("get_firewall_policy")?;
    lock(&client.firewall_policies)
        .get(id)
        .cloned()
        .ok_or_else(|| not_found("firewall policy", id))
}

pub async fn delete_firewall_policy(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_firewall_policy")?;
    if lock(&client.firewalls).values().any(|f| f.value.firewall_policy_id == id) {
        return Err(conflict(format!("firewall policy {id} is in use")));
    }
    let policy = lock(&client.firewall_policies)
        .remove(id)
        .ok_or_else(|| not_found("firewall policy", id))?;
    let mut rules = lock(&client.firewall_rules);
    for rule_id in &policy.firewall_rules {
        if let Some(rule) = rules.get_mut(rule_id) {
            rule.firewall_policy_id = None;
        }
    }
    Ok(())
}

pub async fn create_firewall(client: &MockOpenStackClient, request: &CreateFirewallRequest) -> Result<Firewall, OpenStackError> {
    client.enter("create_firewall")?;
    if !lock(&client.firewall_policies).contains_key(&request.firewall_policy_id) {
        return Err(not_found("firewall policy", &request.firewall_policy_id));
    }
    let firewall = Firewall {
        id: client.next_id("firewall"),
        name: request.name.clone().unwrap_or_default(),
        description: request.description.clone().unwrap_or_default(),
        firewall_policy_id: request.firewall_policy_id.clone(),
        admin_state_up: request.admin_state_up,
        shared: request.shared,
        status: "PENDING_CREATE".to_string(),
        tenant_id: request.tenant_id.clone(),
    };
    let mut tracked = Tracked::settled(firewall.clone());
    tracked.transition("PENDING_CREATE", client.pending_polls, &client.settle_status("firewall", "ACTIVE"));
    lock(&client.firewalls).insert(firewall.id.clone(), tracked);
    Ok(firewall)
}

pub async fn get_firewall(client: &MockOpenStackClient, id: &str) -> Result<Firewall, OpenStackError> {
    client.enter("get_firewall")?;
    poll_tracked(&client.firewalls, "firewall", id)
}

pub async fn delete_firewall(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_firewall")?;
    let mut firewalls = lock(&client.firewalls);
    let entry = firewalls.get_mut(id).ok_or_else(|| not_found("firewall", id))?;
    entry.remove_after(Some("PENDING_DELETE"), client.delete_polls);
    Ok(())
}

pub async fn create_pool(client: &MockOpenStackClient, request: &CreatePoolRequest) -> Result<Pool, OpenStackError> {
    client.enter("create_pool")?;
    let pool = Pool {
        id: client.next_id("pool"),
        name: request.name.clone(),
        description: request.description.clone().unwrap_or_default(),
        subnet_id: request.subnet_id.clone(),
        protocol: request.protocol.clone(),
        lb_method: request.lb_method.clone(),
        provider: request.provider.clone(),
        status: "PENDING_CREATE".to_string(),
        members: Vec::new(),
        health_monitors: Vec::new(),
        vip_id: None,
        tenant_id: client.tenant_id.clone(),
    };
    let mut tracked = Tracked::settled(pool.clone());
    tracked.transition("PENDING_CREATE", client.pending_polls, &client.settle_status("pool", "ACTIVE"));
    lock(&client.pools).insert(pool.id.clone(), tracked);
    Ok(pool)
}

pub async fn get_pool(client: &MockOpenStackClient, id: &str) -> Result<Pool, OpenStackError> {
    client.enter("get_pool")?;
    poll_tracked(&client.pools, "pool", id)
}

pub async fn update_pool(client: &MockOpenStackClient, id: &str, request: &UpdatePoolRequest) -> Result<Pool, OpenStackError> {
    client.enter("update_pool")?;
    let mut pools = lock(&client.pools);
    let entry = pools.get_mut(id).ok_or_else(|| not_found("pool", id))?;
    if let Some(name) = &request.name {
        entry.value.name = name.clone();
    }
    if let Some(description) = &request.description {
        entry.value.description = description.clone();
    }
    if let Some(lb_method) = &request.lb_method {
        entry.value.lb_method = lb_method.clone();
    }
    Ok(entry.value.clone())
}

pub async fn delete_pool(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_pool")?;
    let mut pools = lock(&client.pools);
    let entry = pools.get_mut(id).ok_or_else(|| not_found("pool", id))?;
    if let Some(vip) = &entry.value.vip_id {
        return Err(conflict(format!("pool {id} is still used by VIP {vip}")));
    }
    entry.remove_after(Some("PENDING_DELETE"), client.delete_polls);
    Ok(())
}

pub async fn create_member(client: &MockOpenStackClient, request: &CreateMemberRequest) -> Result<Member, OpenStackError> {
    client.enter("create_member")?;
    let mut pools = lock(&client.pools);
    let entry = pools
        .get_mut(&request.pool_id)
        .ok_or_else(|| not_found("pool", &request.pool_id))?;

    let member = Member {
        id: client.next_id("member"),
        pool_id: request.pool_id.clone(),
        address: request.address.clone(),
        protocol_port: request.protocol_port,
        admin_state_up: request.admin_state_up,
        status: "ACTIVE".to_string(),
    };
    entry.value.members.push(member.id.clone());
    lock(&client.members).insert(member.id.clone(), member.clone());
    Ok(member)
}

pub async fn delete_member(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_member")?;
    let member = lock(&client.members).remove(id).ok_or_else(|| not_found("member", id))?;
    if let Some(entry) = lock(&client.pools).get_mut(&member.pool_id) {
        entry.value.members.retain(|m| m != id);
    }
    Ok(())
}

pub async fn create_health_monitor(client: &MockOpenStackClient, request: &CreateHealthMonitorRequest) -> Result<HealthMonitor, OpenStackError> {
    client.enter("create_health_monitor")?;
    let monitor = HealthMonitor {
        id: client.next_id("monitor"),
        monitor_type: request.monitor_type.clone(),
        delay: request.delay,
        timeout: request.timeout,
        max_retries: request.max_retries,
        http_method: request.http_method.clone(),
        expected_codes: request.expected_codes.clone(),
        admin_state_up: true,
    };
    lock(&client.health_monitors).insert(monitor.id.clone(), monitor.clone());
    Ok(monitor)
}

pub async fn delete_health_monitor(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_health_monitor")?;
    if lock(&client.pools)
        .values()
        .any(|p| p.value.health_monitors.iter().any(|m| m == id))
    {
        return Err(conflict(format!("health monitor {id} is associated with a pool")));
    }
    lock(&client.health_monitors)
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| not_found("health monitor", id))
}

pub async fn associate_health_monitor(client: &MockOpenStackClient, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
    client.enter("associate_health_monitor")?;
    if !lock(&client.health_monitors).contains_key(monitor_id) {
        return Err(not_found("health monitor", monitor_id));
    }
    let mut pools = lock(&client.pools);
    let entry = pools.get_mut(pool_id).ok_or_else(|| not_found("pool", pool_id))?;
    if !entry.value.health_monitors.iter().any(|m| m == monitor_id) {
        entry.value.health_monitors.push(monitor_id.to_string());
    }
    Ok(())
}

pub async fn disassociate_health_monitor(client: &MockOpenStackClient, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
    client.enter("disassociate_health_monitor")?;
    let mut pools = lock(&client.pools);
    let entry = pools.get_mut(pool_id).ok_or_else(|| not_found("pool", pool_id))?;
    let before = entry.value.health_monitors.len();
    entry.value.health_monitors.retain(|m| m != monitor_id);
    if entry.value.health_monitors.len() == before {
        return Err(not_found("health monitor association", monitor_id));
    }
    Ok(())
}

pub async fn create_vip(client: &MockOpenStackClient, request: &CreateVipRequest) -> Result<Vip, OpenStackError> {
    client.enter("create_vip")?;
    let mut pools = lock(&client.pools);
    let entry = pools
        .get_mut(&request.pool_id)
        .ok_or_else(|| not_found("pool", &request.pool_id))?;
    if entry.value.vip_id.is_some() {
        return Err(conflict(format!("pool {} already has a VIP", request.pool_id)));
    }

    let n = client.next_number();
    let port = Port {
        id: format!("port-{n}"),
        network_id: String::new(),
        device_id: format!("vip-{n}"),
        device_owner: "neutron:LOADBALANCER".to_string(),
        status: "ACTIVE".to_string(),
        fixed_ips: vec![FixedIp {
            subnet_id: request.subnet_id.clone(),
            ip_address: format!("10.0.1.{}", n % 250 + 2),
        }],
    };
    let vip = Vip {
        id: format!("vip-{n}"),
        name: request.name.clone(),
        subnet_id: request.subnet_id.clone(),
        protocol: request.protocol.clone(),
        protocol_port: request.protocol_port,
        pool_id: request.pool_id.clone(),
        port_id: port.id.clone(),
        address: port.fixed_ips[0].ip_address.clone(),
        status: "ACTIVE".to_string(),
    };
    entry.value.vip_id = Some(vip.id.clone());
    lock(&client.ports).insert(port.id.clone(), port);
    lock(&client.vips).insert(vip.id.clone(), vip.clone());
    Ok(vip)
}

pub async fn get_vip(client: &MockOpenStackClient, id: &str) -> Result<Vip, OpenStackError> {
    client.enter("get_vip")?;
    lock(&client.vips).get(id).cloned().ok_or_else(|| not_found("vip", id))
}

pub async fn delete_vip(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_vip")?;
    let vip = lock(&client.vips).remove(id).ok_or_else(|| not_found("vip", id))?;
    lock(&client.ports).remove(&vip.port_id);
    for fip in lock(&client.floating_ips).values_mut() {
        if fip.port_id.as_deref() == Some(vip.port_id.as_str()) {
            fip.port_id = None;
            fip.fixed_ip_address = None;
        }
    }
    if let Some(entry) = lock(&client.pools).get_mut(&vip.pool_id) {
        entry.value.vip_id = None;
    }
    Ok(())
}

pub async fn list_network_floating_ips(client: &MockOpenStackClient) -> Result<Vec<FloatingIp>, OpenStackError> {
    client.enter("list_network_floating_ips")?;
    let mut fips: Vec<FloatingIp> = lock(&client.floating_ips).values().cloned().collect();
    fips.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(fips)
}

pub async fn associate_network_floating_ip(client: &MockOpenStackClient, floating_ip_id: &str, port_id: &str) -> Result<FloatingIp, OpenStackError> {
    client.enter("associate_network_floating_ip")?;
    let fixed_ip = lock(&client.ports)
        .get(port_id)
        .ok_or_else(|| not_found("port", port_id))?
        .fixed_ips
        .first()
        .map(|ip| ip.ip_address.clone());

    let mut fips = lock(&client.floating_ips);
    let fip = fips
        .get_mut(floating_ip_id)
        .ok_or_else(|| not_found("floating IP", floating_ip_id))?;
    if fip.port_id.is_some() {
        return Err(conflict(format!("floating IP {floating_ip_id} is already associated")));
    }
    fip.port_id = Some(port_id.to_string());
    fip.fixed_ip_address = fixed_ip;
    fip.status = "ACTIVE".to_string();
    Ok(fip.clone())
}
