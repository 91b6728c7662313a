//! Unit tests for the firewall policy handler

#[cfg(test)]
mod tests {
    use super::super::firewall_policy::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::resources::firewall_rule::{FirewallRuleHandler, FirewallRuleSpec};
    use crate::test_utils::*;
    use openstack_client::{MockOpenStackClient, OpenStackError};
    use serde_json::json;

    async fn rule(mock: &MockOpenStackClient, port: &str) -> String {
        let spec: FirewallRuleSpec = spec(json!({"protocol": "tcp", "action": "allow", "destination_port": port}));
        FirewallRuleHandler.create(&scope(mock), &spec).await.unwrap().0
    }

    #[tokio::test]
    async fn test_create_keeps_rule_order() {
        let mock = MockOpenStackClient::new("RegionOne");
        let ssh = rule(&mock, "22").await;
        let https = rule(&mock, "443").await;

        let spec: FirewallPolicySpec = spec(json!({"name": "edge", "rules": [&https, &ssh]}));
        let (_, state) = FirewallPolicyHandler.create(&scope(&mock), &spec).await.unwrap();

        assert_eq!(state.rules, [https, ssh]);
        assert_eq!(state.tenant_id, TEST_TENANT);
    }

    #[tokio::test]
    async fn test_rules_in_a_policy_cannot_be_deleted() {
        let mock = MockOpenStackClient::new("RegionOne");
        let ssh = rule(&mock, "22").await;
        let spec: FirewallPolicySpec = spec(json!({"rules": [&ssh]}));
        FirewallPolicyHandler.create(&scope(&mock), &spec).await.unwrap();

        let err = scope(&mock).client.delete_firewall_rule(&ssh).await.unwrap_err();

        assert!(matches!(err, OpenStackError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_rule_change_requires_replacement() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let ssh = rule(&mock, "22").await;
        let old: FirewallPolicySpec = spec(json!({"rules": [&ssh]}));
        let (id, prior) = FirewallPolicyHandler.create(&scope, &old).await.unwrap();

        let new: FirewallPolicySpec = spec(json!({"rules": []}));
        let err = FirewallPolicyHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();

        assert!(matches!(err, ProviderError::RequiresReplacement(_)));
    }

    #[tokio::test]
    async fn test_delete_releases_rules() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let ssh = rule(&mock, "22").await;
        let spec: FirewallPolicySpec = spec(json!({"rules": [&ssh]}));
        let (id, prior) = FirewallPolicyHandler.create(&scope, &spec).await.unwrap();

        FirewallPolicyHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(FirewallPolicyHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
        assert_eq!(scope.client.get_firewall_rule(&ssh).await.unwrap().firewall_policy_id, None);
    }
}
