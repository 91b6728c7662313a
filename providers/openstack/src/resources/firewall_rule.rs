//! `openstack_firewall_rule`: an FWaaS rule. Rules are immutable here; any
//! change replaces the rule.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable};
use openstack_client::{CreateFirewallRuleRequest, FirewallRule};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_ip_version() -> u8 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallRuleSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `tcp`, `udp`, `icmp` or `any`
    pub protocol: String,
    /// `allow` or `deny`
    pub action: String,
    #[serde(default = "default_ip_version")]
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
    #[serde(default = "crate::resources::default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRuleState {
    pub name: String,
    pub description: String,
    pub protocol: Option<String>,
    pub action: String,
    pub ip_version: u8,
    pub source_ip_address: Option<String>,
    pub destination_ip_address: Option<String>,
    pub source_port: Option<String>,
    pub destination_port: Option<String>,
    pub shared: bool,
    pub enabled: bool,
    pub tenant_id: String,
    /// Policy the rule belongs to, if any
    pub firewall_policy_id: Option<String>,
}

impl From<FirewallRule> for FirewallRuleState {
    fn from(rule: FirewallRule) -> Self {
        Self {
            name: rule.name,
            description: rule.description,
            protocol: rule.protocol,
            action: rule.action,
            ip_version: rule.ip_version,
            source_ip_address: rule.source_ip_address,
            destination_ip_address: rule.destination_ip_address,
            source_port: rule.source_port,
            destination_port: rule.destination_port,
            shared: rule.shared,
            enabled: rule.enabled,
            tenant_id: rule.tenant_id,
            firewall_policy_id: rule.firewall_policy_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirewallRuleHandler;

#[async_trait::async_trait]
impl ResourceHandler for FirewallRuleHandler {
    type Spec = FirewallRuleSpec;
    type State = FirewallRuleState;

    fn validate(&self, spec: &FirewallRuleSpec) -> Result<(), ProviderError> {
        if !matches!(spec.protocol.as_str(), "tcp" | "udp" | "icmp" | "any") {
            return Err(ProviderError::InvalidResource(format!(
                "firewall rule protocol must be tcp, udp, icmp or any, got {:?}",
                spec.protocol
            )));
        }
        if !matches!(spec.action.as_str(), "allow" | "deny") {
            return Err(ProviderError::InvalidResource(format!(
                "firewall rule action must be allow or deny, got {:?}",
                spec.action
            )));
        }
        if !matches!(spec.ip_version, 4 | 6) {
            return Err(ProviderError::InvalidResource(format!(
                "ip_version must be 4 or 6, got {}",
                spec.ip_version
            )));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &FirewallRuleSpec) -> Result<(String, FirewallRuleState), ProviderError> {
        let request = CreateFirewallRuleRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            protocol: spec.protocol.clone(),
            action: spec.action.clone(),
            ip_version: spec.ip_version,
            source_ip_address: spec.source_ip_address.clone(),
            destination_ip_address: spec.destination_ip_address.clone(),
            source_port: spec.source_port.clone(),
            destination_port: spec.destination_port.clone(),
            shared: spec.shared,
            enabled: spec.enabled,
            tenant_id: scope.tenant_id.clone(),
        };
        let rule = scope.client.create_firewall_rule(&request).await?;
        info!("Firewall rule {} created ({} {})", rule.id, spec.action, spec.protocol);
        Ok((rule.id.clone(), rule.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &FirewallRuleSpec, _prior: &FirewallRuleState) -> Result<Option<FirewallRuleState>, ProviderError> {
        Ok(found(scope.client.get_firewall_rule(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &FirewallRuleSpec, new: &FirewallRuleSpec, _prior: &FirewallRuleState) -> Result<FirewallRuleState, ProviderError> {
        immutable("firewall rule", old, new)?;
        Ok(scope.client.get_firewall_rule(id).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &FirewallRuleSpec, _prior: &FirewallRuleState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_firewall_rule(id).await)
    }
}
