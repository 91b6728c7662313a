//! `openstack_floating_ip`: a nova-network floating IP, optionally
//! associated with a server

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable, partial};
use openstack_client::NovaFloatingIp;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloatingIpSpec {
    pub pool: String,
    /// Server to associate with; empty or `"0"` leaves the address free
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl FloatingIpSpec {
    fn instance(&self) -> Option<&str> {
        self.instance_id.as_deref().filter(|id| !id.is_empty() && *id != "0")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIpState {
    pub pool: String,
    pub address: String,
    pub fixed_ip: Option<String>,
    pub instance_id: Option<String>,
}

impl From<NovaFloatingIp> for FloatingIpState {
    fn from(fip: NovaFloatingIp) -> Self {
        Self {
            pool: fip.pool,
            address: fip.ip,
            fixed_ip: fip.fixed_ip,
            instance_id: fip.instance_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatingIpHandler;

#[async_trait::async_trait]
impl ResourceHandler for FloatingIpHandler {
    type Spec = FloatingIpSpec;
    type State = FloatingIpState;

    fn validate(&self, spec: &FloatingIpSpec) -> Result<(), ProviderError> {
        if spec.pool.is_empty() {
            return Err(ProviderError::InvalidResource("floating IP pool is required".to_string()));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &FloatingIpSpec) -> Result<(String, FloatingIpState), ProviderError> {
        let client = &scope.client;
        let fip = client.allocate_floating_ip(&spec.pool).await?;
        info!("Allocated floating IP {} from pool {}", fip.ip, spec.pool);

        let associated = async {
            if let Some(server_id) = spec.instance() {
                client.associate_floating_ip(server_id, &fip.ip).await?;
                info!("Associated {} with server {}", fip.ip, server_id);
            }
            client.get_floating_ip(&fip.id).await
        }
        .await;
        let fip = match associated {
            Ok(fip) => fip,
            Err(e) => {
                let id = fip.id.clone();
                return Err(partial(&id, &FloatingIpState::from(fip), e.into()));
            }
        };
        Ok((fip.id.clone(), fip.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &FloatingIpSpec, _prior: &FloatingIpState) -> Result<Option<FloatingIpState>, ProviderError> {
        Ok(found(scope.client.get_floating_ip(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &FloatingIpSpec, new: &FloatingIpSpec, _prior: &FloatingIpState) -> Result<FloatingIpState, ProviderError> {
        immutable("pool", &old.pool, &new.pool)?;

        let client = &scope.client;
        let current = client.get_floating_ip(id).await?;
        if current.instance_id.as_deref() != new.instance() {
            if let Some(server_id) = current.instance_id.as_deref() {
                client.disassociate_floating_ip(server_id, &current.ip).await?;
                info!("Disassociated {} from server {}", current.ip, server_id);
            }
            if let Some(server_id) = new.instance() {
                client.associate_floating_ip(server_id, &current.ip).await?;
                info!("Associated {} with server {}", current.ip, server_id);
            }
        }

        Ok(client.get_floating_ip(id).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &FloatingIpSpec, _prior: &FloatingIpState) -> Result<(), ProviderError> {
        let client = &scope.client;
        let Some(fip) = found(client.get_floating_ip(id).await)? else {
            return Ok(());
        };
        if let Some(server_id) = fip.instance_id.as_deref() {
            ignore_not_found(client.disassociate_floating_ip(server_id, &fip.ip).await)?;
        }
        ignore_not_found(client.release_floating_ip(id).await)?;
        info!("Released floating IP {}", fip.ip);
        Ok(())
    }
}
