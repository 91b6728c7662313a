//! Unit tests for the network handler

#[cfg(test)]
mod tests {
    use super::super::network::*;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::MockOpenStackClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_defaults_admin_state_up() {
        let mock = MockOpenStackClient::new("RegionOne");

        let spec: NetworkSpec = spec(json!({"name": "private"}));
        let (id, state) = NetworkHandler.create(&scope(&mock), &spec).await.unwrap();

        assert!(id.starts_with("network-"));
        assert!(state.admin_state_up);
        assert_eq!(state.status, "ACTIVE");
        assert_eq!(state.tenant_id, TEST_TENANT);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let old: NetworkSpec = spec(json!({"name": "private"}));
        let (id, prior) = NetworkHandler.create(&scope, &old).await.unwrap();

        let new: NetworkSpec = spec(json!({"name": "backend", "admin_state_up": false}));
        let state = NetworkHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        assert_eq!(state.name, "backend");
        assert!(!state.admin_state_up);
        assert_eq!(mock.call_count("update_network"), 1);
    }

    #[tokio::test]
    async fn test_unchanged_update_makes_no_write() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec: NetworkSpec = spec(json!({"name": "private"}));
        let (id, prior) = NetworkHandler.create(&scope, &spec).await.unwrap();

        let state = NetworkHandler.update(&scope, &id, &spec, &spec, &prior).await.unwrap();

        assert_eq!(state, prior);
        assert_eq!(mock.call_count("update_network"), 0);
    }

    #[tokio::test]
    async fn test_delete_then_read_is_gone() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec: NetworkSpec = spec(json!({"name": "private"}));
        let (id, prior) = NetworkHandler.create(&scope, &spec).await.unwrap();

        NetworkHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(NetworkHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
        NetworkHandler.delete(&scope, &id, &spec, &prior).await.unwrap();
    }
}
