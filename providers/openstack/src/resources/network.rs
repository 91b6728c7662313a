//! `openstack_network`: a Neutron network

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found};
use openstack_client::{CreateNetworkRequest, Network, UpdateNetworkRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default = "crate::resources::default_true")]
    pub admin_state_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub name: String,
    pub admin_state_up: bool,
    pub status: String,
    pub shared: bool,
    pub tenant_id: String,
    pub subnets: Vec<String>,
}

impl From<Network> for NetworkState {
    fn from(network: Network) -> Self {
        Self {
            name: network.name,
            admin_state_up: network.admin_state_up,
            status: network.status,
            shared: network.shared,
            tenant_id: network.tenant_id,
            subnets: network.subnets,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkHandler;

#[async_trait::async_trait]
impl ResourceHandler for NetworkHandler {
    type Spec = NetworkSpec;
    type State = NetworkState;

    async fn create(&self, scope: &Scope, spec: &NetworkSpec) -> Result<(String, NetworkState), ProviderError> {
        let request = CreateNetworkRequest {
            name: spec.name.clone(),
            admin_state_up: spec.admin_state_up,
            shared: None,
            tenant_id: Some(scope.tenant_id.clone()),
        };
        let network = scope.client.create_network(&request).await?;
        info!("Network {} created as {}", spec.name, network.id);
        Ok((network.id.clone(), network.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &NetworkSpec, _prior: &NetworkState) -> Result<Option<NetworkState>, ProviderError> {
        Ok(found(scope.client.get_network(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &NetworkSpec, new: &NetworkSpec, _prior: &NetworkState) -> Result<NetworkState, ProviderError> {
        if old == new {
            return Ok(scope.client.get_network(id).await?.into());
        }
        let request = UpdateNetworkRequest {
            name: (old.name != new.name).then(|| new.name.clone()),
            admin_state_up: (old.admin_state_up != new.admin_state_up).then_some(new.admin_state_up),
        };
        Ok(scope.client.update_network(id, &request).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &NetworkSpec, _prior: &NetworkState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_network(id).await)
    }
}
