//! `openstack_firewall_policy`: an ordered list of firewall rules

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable};
use openstack_client::{CreateFirewallPolicyRequest, FirewallPolicy};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallPolicySpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub audited: bool,
    #[serde(default)]
    pub shared: bool,
    /// Rule ids, in evaluation order
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPolicyState {
    pub name: String,
    pub description: String,
    pub audited: bool,
    pub shared: bool,
    pub rules: Vec<String>,
    pub tenant_id: String,
}

impl From<FirewallPolicy> for FirewallPolicyState {
    fn from(policy: FirewallPolicy) -> Self {
        Self {
            name: policy.name,
            description: policy.description,
            audited: policy.audited,
            shared: policy.shared,
            rules: policy.firewall_rules,
            tenant_id: policy.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirewallPolicyHandler;

#[async_trait::async_trait]
impl ResourceHandler for FirewallPolicyHandler {
    type Spec = FirewallPolicySpec;
    type State = FirewallPolicyState;

    async fn create(&self, scope: &Scope, spec: &FirewallPolicySpec) -> Result<(String, FirewallPolicyState), ProviderError> {
        let request = CreateFirewallPolicyRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            audited: spec.audited,
            shared: spec.shared,
            firewall_rules: spec.rules.clone(),
            tenant_id: scope.tenant_id.clone(),
        };
        let policy = scope.client.create_firewall_policy(&request).await?;
        info!("Firewall policy {} created with {} rules", policy.id, policy.firewall_rules.len());
        Ok((policy.id.clone(), policy.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &FirewallPolicySpec, _prior: &FirewallPolicyState) -> Result<Option<FirewallPolicyState>, ProviderError> {
        Ok(found(scope.client.get_firewall_policy(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &FirewallPolicySpec, new: &FirewallPolicySpec, _prior: &FirewallPolicyState) -> Result<FirewallPolicyState, ProviderError> {
        immutable("firewall policy", old, new)?;
        Ok(scope.client.get_firewall_policy(id).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &FirewallPolicySpec, _prior: &FirewallPolicyState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_firewall_policy(id).await)
    }
}
