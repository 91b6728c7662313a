//! `openstack_router`: a Neutron router with an optional external gateway
//! and one interface per attached subnet

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable, non_empty, partial};
use crate::waits::{self, wait_for};
use openstack_client::{CreateRouterRequest, ExternalGateway, OpenStackClientTrait, Port, Router};
use serde::{Deserialize, Serialize};
use state_reconciler::TargetStatus;
use std::sync::Arc;
use tracing::{debug, info};

const INTERFACE_OWNER: &str = "network:router_interface";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterSpec {
    pub name: String,
    /// Route through an external network
    #[serde(default)]
    pub external_gateway: bool,
    /// External network to use; the first external network when unset
    #[serde(default)]
    pub external_id: Option<String>,
    /// Subnets to attach an interface to
    #[serde(default)]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub subnet_id: String,
    pub port_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterState {
    pub name: String,
    pub status: String,
    pub admin_state_up: bool,
    pub tenant_id: String,
    pub external_network_id: Option<String>,
    pub interfaces: Vec<InterfaceState>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterHandler;

fn interfaces(ports: &[Port]) -> Vec<InterfaceState> {
    ports
        .iter()
        .filter(|p| p.device_owner == INTERFACE_OWNER)
        .flat_map(|p| {
            p.fixed_ips.iter().map(|ip| InterfaceState {
                subnet_id: ip.subnet_id.clone(),
                port_id: p.id.clone(),
            })
        })
        .collect()
}

fn state_from(router: Router, ports: &[Port]) -> RouterState {
    RouterState {
        name: router.name,
        status: router.status,
        admin_state_up: router.admin_state_up,
        tenant_id: router.tenant_id,
        external_network_id: router.external_gateway_info.map(|g| g.network_id),
        interfaces: interfaces(ports),
    }
}

async fn external_network(client: &dyn OpenStackClientTrait, spec: &RouterSpec) -> Result<String, ProviderError> {
    if let Some(id) = non_empty(spec.external_id.as_deref()) {
        return Ok(id.to_string());
    }
    let network = client
        .list_external_networks()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResource("no external network available for the router gateway".to_string()))?;
    debug!("Using external network {} ({})", network.name, network.id);
    Ok(network.id)
}

async fn observe(client: &dyn OpenStackClientTrait, id: &str) -> Result<RouterState, ProviderError> {
    let router = client.get_router(id).await?;
    let ports = client.list_ports(Some(id)).await?;
    Ok(state_from(router, &ports))
}

#[async_trait::async_trait]
impl ResourceHandler for RouterHandler {
    type Spec = RouterSpec;
    type State = RouterState;

    fn validate(&self, spec: &RouterSpec) -> Result<(), ProviderError> {
        if !spec.external_gateway && non_empty(spec.external_id.as_deref()).is_some() {
            return Err(ProviderError::InvalidResource(
                "external_id is only used with external_gateway".to_string(),
            ));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &RouterSpec) -> Result<(String, RouterState), ProviderError> {
        let client = &scope.client;
        let external_gateway_info = if spec.external_gateway {
            Some(ExternalGateway {
                network_id: external_network(client.as_ref(), spec).await?,
            })
        } else {
            None
        };

        let request = CreateRouterRequest {
            name: spec.name.clone(),
            admin_state_up: true,
            external_gateway_info,
        };
        let router = client.create_router(&request).await?;
        info!("Router {} created as {}, waiting for ACTIVE", spec.name, router.id);

        let built = async {
            wait_for(&router.id, &["BUILD"], TargetStatus::status("ACTIVE"), waits::ROUTER, |id| {
                let client = Arc::clone(client);
                async move {
                    let router = client.get_router(&id).await?;
                    Ok((router.status.clone(), router))
                }
            })
            .await?;

            for subnet_id in &spec.subnets {
                let interface = client.add_router_interface(&router.id, subnet_id).await?;
                debug!("Router {} attached to subnet {} via port {}", router.id, subnet_id, interface.port_id);
            }

            observe(client.as_ref(), &router.id).await
        }
        .await;
        match built {
            Ok(state) => Ok((router.id, state)),
            Err(e) => {
                let id = router.id.clone();
                Err(partial(&id, &state_from(router, &[]), e))
            }
        }
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &RouterSpec, _prior: &RouterState) -> Result<Option<RouterState>, ProviderError> {
        let client = scope.client.as_ref();
        let Some(router) = found(client.get_router(id).await)? else {
            return Ok(None);
        };
        let ports = client.list_ports(Some(id)).await?;
        Ok(Some(state_from(router, &ports)))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &RouterSpec, new: &RouterSpec, _prior: &RouterState) -> Result<RouterState, ProviderError> {
        immutable("external_gateway", &old.external_gateway, &new.external_gateway)?;
        immutable("external_id", &old.external_id, &new.external_id)?;

        let client = scope.client.as_ref();
        if old.name != new.name {
            client.rename_router(id, &new.name).await?;
        }

        if old.subnets != new.subnets {
            let current = interfaces(&client.list_ports(Some(id)).await?);
            for interface in current.iter().filter(|i| !new.subnets.contains(&i.subnet_id)) {
                ignore_not_found(client.remove_router_interface(id, &interface.port_id).await)?;
                info!("Router {} detached from subnet {}", id, interface.subnet_id);
            }
            for subnet_id in new.subnets.iter().filter(|s| !current.iter().any(|i| &i.subnet_id == *s)) {
                client.add_router_interface(id, subnet_id).await?;
                info!("Router {} attached to subnet {}", id, subnet_id);
            }
        }

        observe(client, id).await
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &RouterSpec, _prior: &RouterState) -> Result<(), ProviderError> {
        let client = &scope.client;
        let ports = match client.list_ports(Some(id)).await {
            Ok(ports) => ports,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        for interface in interfaces(&ports) {
            ignore_not_found(client.remove_router_interface(id, &interface.port_id).await)?;
        }

        match client.delete_router(id).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_for(id, &["ACTIVE", "BUILD", "ERROR"], TargetStatus::Deleted, waits::ROUTER, |id| {
            let client = Arc::clone(client);
            async move {
                let router = client.get_router(&id).await?;
                Ok((router.status.clone(), router))
            }
        })
        .await?;
        Ok(())
    }
}
