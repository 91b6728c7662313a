//! Unit tests for the security group handler

#[cfg(test)]
mod tests {
    use super::super::secgroup::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::MockOpenStackClient;
    use serde_json::json;

    fn web_group() -> SecGroupSpec {
        spec(json!({
            "name": "web",
            "description": "web tier",
            "rules": [
                {"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"},
                {"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "0.0.0.0/0"}
            ]
        }))
    }

    #[tokio::test]
    async fn test_create_group_with_rules() {
        let mock = MockOpenStackClient::new("RegionOne");

        let (id, state) = SecGroupHandler.create(&scope(&mock), &web_group()).await.unwrap();

        assert_eq!(state.rules.len(), 2);
        assert!(state.rules.iter().all(|r| r.id.starts_with("rule-")));
        assert_eq!(mock.security_group(&id).unwrap().rules.len(), 2);
    }

    #[tokio::test]
    async fn test_source_group_rule() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let (lb_id, _) = SecGroupHandler
            .create(&scope, &spec(json!({"name": "lb"})))
            .await
            .unwrap();

        let app: SecGroupSpec = spec(json!({
            "name": "app",
            "rules": [{"from_port": 8080, "to_port": 8080, "protocol": "tcp", "source_group": &lb_id}]
        }));
        let (app_id, state) = SecGroupHandler.create(&scope, &app).await.unwrap();

        assert_eq!(state.rules[0].source_group.as_deref(), Some(lb_id.as_str()));
        let group = mock.security_group(&app_id).unwrap();
        assert_eq!(group.rules[0].group.name.as_deref(), Some("lb"));
    }

    #[tokio::test]
    async fn test_failed_rule_keeps_the_group_and_earlier_rules() {
        // Setup
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec: SecGroupSpec = spec(json!({
            "name": "app",
            "rules": [
                {"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "10.0.0.0/8"},
                {"from_port": 8080, "to_port": 8080, "protocol": "tcp", "source_group": "sg-missing"}
            ]
        }));

        // Execute
        let err = SecGroupHandler.create(&scope, &spec).await.unwrap_err();

        // Assert
        let (id, state, source) = expect_partial::<SecGroupState>(err);
        assert!(matches!(source, ProviderError::OpenStack(ref e) if e.is_not_found()));
        assert_eq!(state.rules.len(), 1);
        assert_eq!(mock.security_group(&id).unwrap().rules.len(), 1);

        SecGroupHandler.delete(&scope, &id, &spec, &state).await.unwrap();
        assert!(mock.security_group(&id).is_none());
    }

    #[test]
    fn test_rule_needs_exactly_one_source() {
        let neither: SecGroupSpec = spec(json!({
            "name": "web",
            "rules": [{"from_port": 22, "to_port": 22, "protocol": "tcp"}]
        }));
        let both: SecGroupSpec = spec(json!({
            "name": "web",
            "rules": [{"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr": "0.0.0.0/0", "source_group": "sg-1"}]
        }));

        assert!(matches!(SecGroupHandler.validate(&neither), Err(ProviderError::InvalidResource(_))));
        assert!(SecGroupHandler.validate(&both).is_err());
        assert!(SecGroupHandler.validate(&web_group()).is_ok());
    }

    #[tokio::test]
    async fn test_update_replaces_only_changed_rules() {
        // Setup
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let old = web_group();
        let (id, prior) = SecGroupHandler.create(&scope, &old).await.unwrap();
        let ssh_rule_id = prior.rules[0].id.clone();

        let mut new = old.clone();
        new.description = "public web tier".to_string();
        new.rules[1].from_port = 443;
        new.rules[1].to_port = 443;

        // Execute
        let state = SecGroupHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        // Assert
        assert_eq!(state.description, "public web tier");
        assert_eq!(state.rules.len(), 2);
        assert_eq!(state.rules[0].id, ssh_rule_id);
        assert_eq!(state.rules[1].from_port, 443);
        assert_eq!(mock.call_count("delete_security_group_rule"), 1);
        assert_eq!(mock.call_count("create_security_group_rule"), 3);
    }

    #[tokio::test]
    async fn test_read_drops_rules_deleted_elsewhere() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec = web_group();
        let (id, prior) = SecGroupHandler.create(&scope, &spec).await.unwrap();
        scope.client.delete_security_group_rule(&prior.rules[1].id).await.unwrap();

        let state = SecGroupHandler.read(&scope, &id, &spec, &prior).await.unwrap().unwrap();

        assert_eq!(state.rules.len(), 1);
        assert_eq!(state.rules[0].from_port, 22);
    }

    #[tokio::test]
    async fn test_delete_group() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec = web_group();
        let (id, prior) = SecGroupHandler.create(&scope, &spec).await.unwrap();

        SecGroupHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(mock.security_group(&id).is_none());
        assert!(SecGroupHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }
}
