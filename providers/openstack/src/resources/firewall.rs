//! `openstack_firewall`: an FWaaS firewall applying one policy
//!
//! Creation waits `PENDING_CREATE` -> `ACTIVE`; deletion waits until the
//! firewall is gone. Neither step has a long timeout.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, immutable, partial};
use crate::waits::{self, wait_for};
use openstack_client::{CreateFirewallRequest, Firewall, OpenStackClientTrait};
use serde::{Deserialize, Serialize};
use state_reconciler::TargetStatus;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub policy_id: String,
    #[serde(default = "crate::resources::default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallState {
    pub name: String,
    pub description: String,
    pub policy_id: String,
    pub admin_state_up: bool,
    pub shared: bool,
    pub status: String,
    pub tenant_id: String,
}

impl From<Firewall> for FirewallState {
    fn from(firewall: Firewall) -> Self {
        Self {
            name: firewall.name,
            description: firewall.description,
            policy_id: firewall.firewall_policy_id,
            admin_state_up: firewall.admin_state_up,
            shared: firewall.shared,
            status: firewall.status,
            tenant_id: firewall.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirewallHandler;

async fn wait_for_firewall(client: &Arc<dyn OpenStackClientTrait>, id: &str, pending: &[&str], target: TargetStatus) -> Result<Option<Firewall>, ProviderError> {
    wait_for(id, pending, target, waits::FIREWALL, |id| {
        let client = Arc::clone(client);
        async move {
            let firewall = client.get_firewall(&id).await?;
            Ok((firewall.status.clone(), firewall))
        }
    })
    .await
}

#[async_trait::async_trait]
impl ResourceHandler for FirewallHandler {
    type Spec = FirewallSpec;
    type State = FirewallState;

    fn validate(&self, spec: &FirewallSpec) -> Result<(), ProviderError> {
        if spec.policy_id.is_empty() {
            return Err(ProviderError::InvalidResource("firewall policy_id is required".to_string()));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &FirewallSpec) -> Result<(String, FirewallState), ProviderError> {
        let client = &scope.client;
        let request = CreateFirewallRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            firewall_policy_id: spec.policy_id.clone(),
            admin_state_up: spec.admin_state_up,
            shared: spec.shared,
            tenant_id: scope.tenant_id.clone(),
        };
        let firewall = client.create_firewall(&request).await?;
        info!("Firewall {} created, waiting for ACTIVE", firewall.id);

        let active = wait_for_firewall(client, &firewall.id, &["PENDING_CREATE"], TargetStatus::status("ACTIVE"))
            .await
            .and_then(|f| f.ok_or_else(|| ProviderError::Vanished(format!("firewall {}", firewall.id))));
        let firewall = match active {
            Ok(active) => active,
            Err(e) => {
                let id = firewall.id.clone();
                return Err(partial(&id, &FirewallState::from(firewall), e));
            }
        };
        Ok((firewall.id.clone(), firewall.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &FirewallSpec, _prior: &FirewallState) -> Result<Option<FirewallState>, ProviderError> {
        Ok(found(scope.client.get_firewall(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &FirewallSpec, new: &FirewallSpec, _prior: &FirewallState) -> Result<FirewallState, ProviderError> {
        immutable("firewall", old, new)?;
        Ok(scope.client.get_firewall(id).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &FirewallSpec, _prior: &FirewallState) -> Result<(), ProviderError> {
        let client = &scope.client;
        match client.delete_firewall(id).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }
        wait_for_firewall(client, id, &["PENDING_DELETE", "DELETING", "ACTIVE"], TargetStatus::Deleted).await?;
        info!("Firewall {} deleted", id);
        Ok(())
    }
}
