//! Unit tests for the firewall rule handler

#[cfg(test)]
mod tests {
    use super::super::firewall_rule::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::MockOpenStackClient;
    use serde_json::json;

    fn allow_https() -> FirewallRuleSpec {
        spec(json!({"name": "https", "protocol": "tcp", "action": "allow", "destination_port": "443"}))
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_tenant() {
        let mock = MockOpenStackClient::new("RegionOne");

        let (id, state) = FirewallRuleHandler.create(&scope(&mock), &allow_https()).await.unwrap();

        assert!(id.starts_with("fw-rule-"));
        assert_eq!(state.ip_version, 4);
        assert!(state.enabled);
        assert_eq!(state.tenant_id, TEST_TENANT);
        assert_eq!(state.firewall_policy_id, None);
    }

    #[test]
    fn test_validate_action_and_protocol() {
        let reject: FirewallRuleSpec = spec(json!({"protocol": "tcp", "action": "reject"}));
        let gre: FirewallRuleSpec = spec(json!({"protocol": "gre", "action": "allow"}));

        assert!(FirewallRuleHandler.validate(&reject).is_err());
        assert!(FirewallRuleHandler.validate(&gre).is_err());
        assert!(FirewallRuleHandler.validate(&allow_https()).is_ok());
    }

    #[tokio::test]
    async fn test_any_change_requires_replacement() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let old = allow_https();
        let (id, prior) = FirewallRuleHandler.create(&scope, &old).await.unwrap();

        let same = FirewallRuleHandler.update(&scope, &id, &old, &old, &prior).await.unwrap();
        assert_eq!(same, prior);

        let mut new = old.clone();
        new.destination_port = Some("8443".to_string());
        let err = FirewallRuleHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplacement(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec = allow_https();
        let (id, prior) = FirewallRuleHandler.create(&scope, &spec).await.unwrap();

        FirewallRuleHandler.delete(&scope, &id, &spec, &prior).await.unwrap();
        FirewallRuleHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(FirewallRuleHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }
}
