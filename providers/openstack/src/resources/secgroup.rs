//! `openstack_secgroup`: a Nova security group and its ingress rules
//!
//! Rules have no update call. A changed rule is deleted and created again;
//! rules are matched between old and new by their fields, not their position.

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{diff_by, found, ignore_not_found, non_empty, partial};
use openstack_client::{CreateSecurityGroupRule, OpenStackClientTrait, SecurityGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// One ingress rule. Exactly one of `cidr` and `source_group` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecGroupRule {
    pub from_port: i32,
    pub to_port: i32,
    pub protocol: String,
    #[serde(default)]
    pub cidr: Option<String>,
    /// Id of the group whose members may connect
    #[serde(default)]
    pub source_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecGroupSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<SecGroupRule>,
}

/// A rule as created, with the id Nova assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    pub id: String,
    pub from_port: i32,
    pub to_port: i32,
    pub protocol: String,
    pub cidr: Option<String>,
    pub source_group: Option<String>,
}

impl RuleState {
    fn new(id: String, rule: &SecGroupRule) -> Self {
        Self {
            id,
            from_port: rule.from_port,
            to_port: rule.to_port,
            protocol: rule.protocol.clone(),
            cidr: rule.cidr.clone(),
            source_group: rule.source_group.clone(),
        }
    }

    fn matches(&self, rule: &SecGroupRule) -> bool {
        self.from_port == rule.from_port
            && self.to_port == rule.to_port
            && self.protocol == rule.protocol
            && self.cidr == rule.cidr
            && self.source_group == rule.source_group
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecGroupState {
    pub name: String,
    pub description: String,
    pub tenant_id: String,
    pub rules: Vec<RuleState>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecGroupHandler;

async fn create_rule(client: &dyn OpenStackClientTrait, group_id: &str, rule: &SecGroupRule) -> Result<RuleState, ProviderError> {
    let request = CreateSecurityGroupRule {
        parent_group_id: group_id.to_string(),
        from_port: rule.from_port,
        to_port: rule.to_port,
        ip_protocol: rule.protocol.clone(),
        cidr: non_empty(rule.cidr.as_deref()).map(str::to_string),
        group_id: non_empty(rule.source_group.as_deref()).map(str::to_string),
    };
    let created = client.create_security_group_rule(&request).await?;
    debug!(
        "Rule {} added to {}: {} {}-{}",
        created.id, group_id, rule.protocol, rule.from_port, rule.to_port
    );
    Ok(RuleState::new(created.id, rule))
}

fn state_from(group: SecurityGroup, rules: Vec<RuleState>) -> SecGroupState {
    SecGroupState {
        name: group.name,
        description: group.description,
        tenant_id: group.tenant_id,
        rules,
    }
}

#[async_trait::async_trait]
impl ResourceHandler for SecGroupHandler {
    type Spec = SecGroupSpec;
    type State = SecGroupState;

    fn validate(&self, spec: &SecGroupSpec) -> Result<(), ProviderError> {
        if spec.name.is_empty() {
            return Err(ProviderError::InvalidResource("security group name is required".to_string()));
        }
        for rule in &spec.rules {
            let cidr = non_empty(rule.cidr.as_deref());
            let source = non_empty(rule.source_group.as_deref());
            if cidr.is_some() == source.is_some() {
                return Err(ProviderError::InvalidResource(format!(
                    "rule {}/{}-{} needs exactly one of cidr or source_group",
                    rule.protocol, rule.from_port, rule.to_port
                )));
            }
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &SecGroupSpec) -> Result<(String, SecGroupState), ProviderError> {
        let client = scope.client.as_ref();
        let group = client.create_security_group(&spec.name, &spec.description).await?;
        info!("Security group {} created as {}", spec.name, group.id);

        let id = group.id.clone();
        let mut rules = Vec::with_capacity(spec.rules.len());
        for rule in &spec.rules {
            match create_rule(client, &id, rule).await {
                Ok(created) => rules.push(created),
                Err(e) => return Err(partial(&id, &state_from(group, rules), e)),
            }
        }

        Ok((id, state_from(group, rules)))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &SecGroupSpec, prior: &SecGroupState) -> Result<Option<SecGroupState>, ProviderError> {
        let Some(group) = found(scope.client.get_security_group(id).await)? else {
            return Ok(None);
        };
        let live: HashSet<&str> = group.rules.iter().map(|r| r.id.as_str()).collect();
        let rules: Vec<RuleState> = prior
            .rules
            .iter()
            .filter(|r| live.contains(r.id.as_str()))
            .cloned()
            .collect();
        if rules.len() != prior.rules.len() {
            info!("{} rules of security group {} were removed outside this provider", prior.rules.len() - rules.len(), id);
        }
        Ok(Some(state_from(group, rules)))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &SecGroupSpec, new: &SecGroupSpec, prior: &SecGroupState) -> Result<SecGroupState, ProviderError> {
        let client = scope.client.as_ref();

        if old.name != new.name || old.description != new.description {
            client.update_security_group(id, &new.name, &new.description).await?;
        }

        let (mut rules, stale, missing) = diff_by(&prior.rules, &new.rules, RuleState::matches);
        for rule in stale {
            ignore_not_found(client.delete_security_group_rule(&rule.id).await)?;
            debug!("Rule {} removed from {}", rule.id, id);
        }
        for rule in missing {
            rules.push(create_rule(client, id, rule).await?);
        }

        let group = client.get_security_group(id).await?;
        Ok(state_from(group, rules))
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &SecGroupSpec, _prior: &SecGroupState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_security_group(id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(port: i32, cidr: &str) -> SecGroupRule {
        SecGroupRule {
            from_port: port,
            to_port: port,
            protocol: "tcp".to_string(),
            cidr: Some(cidr.to_string()),
            source_group: None,
        }
    }

    #[test]
    fn test_rules_match_by_fields() {
        let prior = vec![
            RuleState::new("r1".to_string(), &rule(22, "0.0.0.0/0")),
            RuleState::new("r2".to_string(), &rule(80, "0.0.0.0/0")),
        ];
        let desired = vec![rule(80, "0.0.0.0/0"), rule(443, "0.0.0.0/0")];

        let (keep, stale, missing) = diff_by(&prior, &desired, RuleState::matches);

        assert_eq!(keep.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r2"]);
        assert_eq!(stale.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r1"]);
        assert_eq!(missing, [&rule(443, "0.0.0.0/0")]);
    }

    #[test]
    fn test_duplicate_rules_are_counted() {
        let prior = vec![RuleState::new("r1".to_string(), &rule(22, "10.0.0.0/8"))];
        let desired = vec![rule(22, "10.0.0.0/8"), rule(22, "10.0.0.0/8")];

        let (keep, stale, missing) = diff_by(&prior, &desired, RuleState::matches);

        assert_eq!(keep.len(), 1);
        assert!(stale.is_empty());
        assert_eq!(missing.len(), 1);
    }
}
