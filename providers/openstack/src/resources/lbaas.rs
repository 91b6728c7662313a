//! `openstack_lbaas`: an LBaaS v1 load balancer
//!
//! One resource covers the pool, its members, its health monitors, the VIP
//! in front of it and optionally a floating IP on that VIP. The pool id is
//! the resource id.
//!
//! Create order: pool (awaited), members, monitors, VIP, floating IP.
//! Delete runs the reverse: members, monitors, VIP, then the pool.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{diff_by, found, ignore_not_found, immutable, non_empty, partial};
use crate::waits::{self, wait_for};
use openstack_client::{
    CreateHealthMonitorRequest, CreateMemberRequest, CreatePoolRequest, CreateVipRequest, OpenStackClientTrait, Pool,
    UpdatePoolRequest, Vip,
};
use serde::{Deserialize, Serialize};
use state_reconciler::TargetStatus;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LbMember {
    pub instance_id: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LbMonitor {
    /// `PING`, `TCP`, `HTTP` or `HTTPS`
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub expected_codes: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LbaasSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub subnet_id: String,
    /// `HTTP`, `HTTPS` or `TCP`
    pub protocol: String,
    /// `ROUND_ROBIN`, `LEAST_CONNECTIONS` or `SOURCE_IP`
    pub lb_method: String,
    pub vip_protocol_port: u16,
    /// External network to take a floating IP from for the VIP
    #[serde(default)]
    pub floating_ip_pool_id: Option<String>,
    #[serde(default)]
    pub members: Vec<LbMember>,
    #[serde(default)]
    pub monitors: Vec<LbMonitor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub member_id: String,
    pub instance_id: String,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub monitor_id: String,
    #[serde(flatten)]
    pub monitor: LbMonitor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipState {
    pub id: String,
    pub address: String,
    pub port_id: String,
    pub protocol_port: u16,
}

impl From<Vip> for VipState {
    fn from(vip: Vip) -> Self {
        Self {
            id: vip.id,
            address: vip.address,
            port_id: vip.port_id,
            protocol_port: vip.protocol_port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipFloatingIp {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbaasState {
    pub name: String,
    pub description: String,
    pub status: String,
    pub protocol: String,
    pub lb_method: String,
    pub subnet_id: String,
    pub provider: Option<String>,
    pub tenant_id: String,
    pub vip: Option<VipState>,
    pub floating_ip: Option<VipFloatingIp>,
    pub members: Vec<MemberState>,
    pub monitors: Vec<MonitorState>,
}

impl LbaasState {
    fn new(pool: Pool, vip: Option<VipState>, floating_ip: Option<VipFloatingIp>, members: Vec<MemberState>, monitors: Vec<MonitorState>) -> Self {
        Self {
            name: pool.name,
            description: pool.description,
            status: pool.status,
            protocol: pool.protocol,
            lb_method: pool.lb_method,
            subnet_id: pool.subnet_id,
            provider: pool.provider,
            tenant_id: pool.tenant_id,
            vip,
            floating_ip,
            members,
            monitors,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LbaasHandler;

/// Address for a member: the instance's fixed IP on the pool subnet, else
/// its first fixed IP.
async fn member_address(client: &dyn OpenStackClientTrait, instance_id: &str, subnet_id: &str) -> Result<String, ProviderError> {
    let ports = client.list_ports(Some(instance_id)).await?;
    let ips: Vec<_> = ports.iter().flat_map(|p| p.fixed_ips.iter()).collect();
    ips.iter()
        .find(|ip| ip.subnet_id == subnet_id)
        .or_else(|| ips.first())
        .map(|ip| ip.ip_address.clone())
        .ok_or_else(|| ProviderError::InvalidResource(format!("instance {instance_id} has no fixed IP to balance to")))
}

async fn add_member(client: &dyn OpenStackClientTrait, pool_id: &str, subnet_id: &str, member: &LbMember) -> Result<MemberState, ProviderError> {
    let address = member_address(client, &member.instance_id, subnet_id).await?;
    let request = CreateMemberRequest {
        pool_id: pool_id.to_string(),
        address: address.clone(),
        protocol_port: member.port,
        admin_state_up: true,
    };
    let created = client.create_member(&request).await?;
    debug!("Member {} ({}:{}) added to pool {}", created.id, address, member.port, pool_id);
    Ok(MemberState {
        member_id: created.id,
        instance_id: member.instance_id.clone(),
        address,
        port: member.port,
    })
}

async fn add_monitor(client: &dyn OpenStackClientTrait, pool_id: &str, monitor: &LbMonitor) -> Result<MonitorState, ProviderError> {
    let request = CreateHealthMonitorRequest {
        monitor_type: monitor.monitor_type.clone(),
        delay: monitor.delay,
        timeout: monitor.timeout,
        max_retries: monitor.max_retries,
        http_method: monitor.http_method.clone(),
        expected_codes: monitor.expected_codes.clone(),
    };
    let created = client.create_health_monitor(&request).await?;
    client.associate_health_monitor(pool_id, &created.id).await?;
    debug!("Health monitor {} associated with pool {}", created.id, pool_id);
    Ok(MonitorState {
        monitor_id: created.id,
        monitor: monitor.clone(),
    })
}

async fn remove_monitor(client: &dyn OpenStackClientTrait, pool_id: &str, monitor_id: &str) -> Result<(), ProviderError> {
    ignore_not_found(client.disassociate_health_monitor(pool_id, monitor_id).await)?;
    ignore_not_found(client.delete_health_monitor(monitor_id).await)
}

/// Associate the first unused floating IP on `network_id` with the VIP port.
async fn attach_floating_ip(client: &dyn OpenStackClientTrait, network_id: &str, vip: &VipState) -> Result<VipFloatingIp, ProviderError> {
    let free = client
        .list_network_floating_ips()
        .await?
        .into_iter()
        .find(|f| f.floating_network_id == network_id && f.port_id.is_none())
        .ok_or_else(|| ProviderError::InvalidResource(format!("no free floating IP on network {network_id}")))?;
    let fip = client.associate_network_floating_ip(&free.id, &vip.port_id).await?;
    info!("Floating IP {} associated with VIP {}", fip.floating_ip_address, vip.address);
    Ok(VipFloatingIp {
        id: fip.id,
        address: fip.floating_ip_address,
    })
}

async fn wait_for_pool(client: &Arc<dyn OpenStackClientTrait>, id: &str, pending: &[&str], target: TargetStatus) -> Result<Option<Pool>, ProviderError> {
    wait_for(id, pending, target, waits::LBAAS, |id| {
        let client = Arc::clone(client);
        async move {
            let pool = client.get_pool(&id).await?;
            Ok((pool.status.clone(), pool))
        }
    })
    .await
}

#[async_trait::async_trait]
impl ResourceHandler for LbaasHandler {
    type Spec = LbaasSpec;
    type State = LbaasState;

    fn validate(&self, spec: &LbaasSpec) -> Result<(), ProviderError> {
        if !matches!(spec.protocol.as_str(), "HTTP" | "HTTPS" | "TCP") {
            return Err(ProviderError::InvalidResource(format!(
                "protocol must be HTTP, HTTPS or TCP, got {:?}",
                spec.protocol
            )));
        }
        if !matches!(spec.lb_method.as_str(), "ROUND_ROBIN" | "LEAST_CONNECTIONS" | "SOURCE_IP") {
            return Err(ProviderError::InvalidResource(format!(
                "lb_method must be ROUND_ROBIN, LEAST_CONNECTIONS or SOURCE_IP, got {:?}",
                spec.lb_method
            )));
        }
        if spec.vip_protocol_port == 0 || spec.members.iter().any(|m| m.port == 0) {
            return Err(ProviderError::InvalidResource("ports must be non-zero".to_string()));
        }
        if let Some(monitor) = spec
            .monitors
            .iter()
            .find(|m| !matches!(m.monitor_type.as_str(), "PING" | "TCP" | "HTTP" | "HTTPS"))
        {
            return Err(ProviderError::InvalidResource(format!(
                "unknown health monitor type {:?}",
                monitor.monitor_type
            )));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &LbaasSpec) -> Result<(String, LbaasState), ProviderError> {
        let client = &scope.client;
        let request = CreatePoolRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            subnet_id: spec.subnet_id.clone(),
            protocol: spec.protocol.clone(),
            lb_method: spec.lb_method.clone(),
            provider: spec.provider.clone(),
        };
        let pool = client.create_pool(&request).await?;
        info!("Pool {} created as {}, waiting for ACTIVE", spec.name, pool.id);
        let id = pool.id.clone();
        let mut members = Vec::with_capacity(spec.members.len());
        let mut monitors = Vec::with_capacity(spec.monitors.len());
        let mut vip = None;
        let built = async {
            wait_for_pool(client, &id, &["PENDING_CREATE"], TargetStatus::status("ACTIVE")).await?;

            for member in &spec.members {
                members.push(add_member(client.as_ref(), &id, &spec.subnet_id, member).await?);
            }
            for monitor in &spec.monitors {
                monitors.push(add_monitor(client.as_ref(), &id, monitor).await?);
            }

            let created = client
                .create_vip(&CreateVipRequest {
                    name: format!("{}_vip", spec.name),
                    subnet_id: spec.subnet_id.clone(),
                    protocol: spec.protocol.clone(),
                    protocol_port: spec.vip_protocol_port,
                    pool_id: id.clone(),
                })
                .await?;
            let created = vip.insert(VipState::from(created));
            info!("VIP {} listening on {}:{}", created.id, created.address, created.protocol_port);

            let floating_ip = match non_empty(spec.floating_ip_pool_id.as_deref()) {
                Some(network_id) => Some(attach_floating_ip(client.as_ref(), network_id, created).await?),
                None => None,
            };
            Ok::<_, ProviderError>((client.get_pool(&id).await?, floating_ip))
        }
        .await;

        let (pool, floating_ip) = match built {
            Ok(built) => built,
            Err(e) => return Err(partial(&id, &LbaasState::new(pool, vip, None, members, monitors), e)),
        };
        Ok((id, LbaasState::new(pool, vip, floating_ip, members, monitors)))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &LbaasSpec, prior: &LbaasState) -> Result<Option<LbaasState>, ProviderError> {
        let client = scope.client.as_ref();
        let Some(pool) = found(client.get_pool(id).await)? else {
            return Ok(None);
        };

        let vip = match pool.vip_id.as_deref() {
            Some(vip_id) => found(client.get_vip(vip_id).await)?.map(VipState::from),
            None => None,
        };
        let floating_ip = match (&vip, &prior.floating_ip) {
            (Some(vip), Some(fip)) => client
                .list_network_floating_ips()
                .await?
                .into_iter()
                .find(|f| f.id == fip.id && f.port_id.as_deref() == Some(vip.port_id.as_str()))
                .map(|f| VipFloatingIp {
                    id: f.id,
                    address: f.floating_ip_address,
                }),
            _ => None,
        };
        let members = prior
            .members
            .iter()
            .filter(|m| pool.members.contains(&m.member_id))
            .cloned()
            .collect();
        let monitors = prior
            .monitors
            .iter()
            .filter(|m| pool.health_monitors.contains(&m.monitor_id))
            .cloned()
            .collect();

        Ok(Some(LbaasState::new(pool, vip, floating_ip, members, monitors)))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &LbaasSpec, new: &LbaasSpec, prior: &LbaasState) -> Result<LbaasState, ProviderError> {
        immutable("subnet_id", &old.subnet_id, &new.subnet_id)?;
        immutable("protocol", &old.protocol, &new.protocol)?;
        immutable("provider", &old.provider, &new.provider)?;
        immutable("vip_protocol_port", &old.vip_protocol_port, &new.vip_protocol_port)?;
        immutable("floating_ip_pool_id", &old.floating_ip_pool_id, &new.floating_ip_pool_id)?;

        let client = scope.client.as_ref();

        if old.name != new.name || old.description != new.description || old.lb_method != new.lb_method {
            let request = UpdatePoolRequest {
                name: (old.name != new.name).then(|| new.name.clone()),
                description: (old.description != new.description).then(|| new.description.clone().unwrap_or_default()),
                lb_method: (old.lb_method != new.lb_method).then(|| new.lb_method.clone()),
            };
            client.update_pool(id, &request).await?;
        }

        let (mut members, stale, missing) = diff_by(&prior.members, &new.members, |state, member| {
            state.instance_id == member.instance_id && state.port == member.port
        });
        for member in stale {
            ignore_not_found(client.delete_member(&member.member_id).await)?;
            debug!("Member {} removed from pool {}", member.member_id, id);
        }
        for member in missing {
            members.push(add_member(client, id, &new.subnet_id, member).await?);
        }

        let (mut monitors, stale, missing) = diff_by(&prior.monitors, &new.monitors, |state, monitor| &state.monitor == monitor);
        for monitor in stale {
            remove_monitor(client, id, &monitor.monitor_id).await?;
        }
        for monitor in missing {
            monitors.push(add_monitor(client, id, monitor).await?);
        }

        let pool = client.get_pool(id).await?;
        Ok(LbaasState::new(pool, prior.vip.clone(), prior.floating_ip.clone(), members, monitors))
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &LbaasSpec, _prior: &LbaasState) -> Result<(), ProviderError> {
        let client = &scope.client;
        let Some(pool) = found(client.get_pool(id).await)? else {
            return Ok(());
        };

        for member_id in &pool.members {
            ignore_not_found(client.delete_member(member_id).await)?;
        }
        for monitor_id in &pool.health_monitors {
            remove_monitor(client.as_ref(), id, monitor_id).await?;
        }
        if let Some(vip_id) = pool.vip_id.as_deref() {
            ignore_not_found(client.delete_vip(vip_id).await)?;
            debug!("VIP {} deleted", vip_id);
        }

        match client.delete_pool(id).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }
        wait_for_pool(client, id, &["PENDING_DELETE", "ACTIVE"], TargetStatus::Deleted).await?;
        info!("Pool {} deleted", id);
        Ok(())
    }
}
