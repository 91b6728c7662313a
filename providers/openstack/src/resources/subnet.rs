//! `openstack_subnet`: a Neutron subnet
//!
//! Only the name and DHCP flag change in place.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable, non_empty};
use openstack_client::{CreateSubnetRequest, Subnet, UpdateSubnetRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_ip_version() -> u8 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetSpec {
    pub network_id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: String,
    #[serde(default = "default_ip_version")]
    pub ip_version: u8,
    #[serde(default = "crate::resources::default_true")]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub gateway_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetState {
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub ip_version: u8,
    pub enable_dhcp: bool,
    pub gateway_ip: Option<String>,
    pub tenant_id: String,
}

impl From<Subnet> for SubnetState {
    fn from(subnet: Subnet) -> Self {
        Self {
            name: subnet.name,
            network_id: subnet.network_id,
            cidr: subnet.cidr,
            ip_version: subnet.ip_version,
            enable_dhcp: subnet.enable_dhcp,
            gateway_ip: subnet.gateway_ip,
            tenant_id: subnet.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubnetHandler;

#[async_trait::async_trait]
impl ResourceHandler for SubnetHandler {
    type Spec = SubnetSpec;
    type State = SubnetState;

    fn validate(&self, spec: &SubnetSpec) -> Result<(), ProviderError> {
        if spec.network_id.is_empty() || spec.cidr.is_empty() {
            return Err(ProviderError::InvalidResource(
                "subnet needs a network_id and a cidr".to_string(),
            ));
        }
        if !matches!(spec.ip_version, 4 | 6) {
            return Err(ProviderError::InvalidResource(format!(
                "ip_version must be 4 or 6, got {}",
                spec.ip_version
            )));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &SubnetSpec) -> Result<(String, SubnetState), ProviderError> {
        let request = CreateSubnetRequest {
            network_id: spec.network_id.clone(),
            name: spec.name.clone(),
            cidr: spec.cidr.clone(),
            ip_version: spec.ip_version,
            enable_dhcp: spec.enable_dhcp,
            gateway_ip: non_empty(spec.gateway_ip.as_deref()).map(str::to_string),
            tenant_id: Some(scope.tenant_id.clone()),
        };
        let subnet = scope.client.create_subnet(&request).await?;
        info!("Subnet {} ({}) created on network {}", subnet.id, subnet.cidr, subnet.network_id);
        Ok((subnet.id.clone(), subnet.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &SubnetSpec, _prior: &SubnetState) -> Result<Option<SubnetState>, ProviderError> {
        Ok(found(scope.client.get_subnet(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &SubnetSpec, new: &SubnetSpec, _prior: &SubnetState) -> Result<SubnetState, ProviderError> {
        immutable("network_id", &old.network_id, &new.network_id)?;
        immutable("cidr", &old.cidr, &new.cidr)?;
        immutable("ip_version", &old.ip_version, &new.ip_version)?;
        immutable("gateway_ip", &old.gateway_ip, &new.gateway_ip)?;

        if old == new {
            return Ok(scope.client.get_subnet(id).await?.into());
        }
        let request = UpdateSubnetRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            enable_dhcp: (old.enable_dhcp != new.enable_dhcp).then_some(new.enable_dhcp),
        };
        Ok(scope.client.update_subnet(id, &request).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &SubnetSpec, _prior: &SubnetState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_subnet(id).await)
    }
}
