//! Unit tests for the router handler

#[cfg(test)]
mod tests {
    use super::super::router::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::MockOpenStackClient;
    use serde_json::json;

    fn mock() -> MockOpenStackClient {
        let mock = MockOpenStackClient::new("RegionOne");
        seed_networks(&mock);
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_picks_external_network_and_attaches_subnets() {
        // Setup
        let mock = mock();
        let spec: RouterSpec = spec(json!({
            "name": "edge",
            "external_gateway": true,
            "subnets": ["subnet-a", "subnet-b"]
        }));

        // Execute
        let (id, state) = RouterHandler.create(&scope(&mock), &spec).await.unwrap();

        // Assert
        assert_eq!(state.status, "ACTIVE");
        assert_eq!(state.external_network_id.as_deref(), Some("net-public"));
        assert_eq!(state.interfaces.len(), 2);
        let port = mock.ports().into_iter().find(|p| p.device_id == id && p.fixed_ips[0].subnet_id == "subnet-a").unwrap();
        assert_eq!(port.fixed_ips[0].ip_address, "10.0.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_without_external_network_fails() {
        let mock = MockOpenStackClient::new("RegionOne");
        let spec: RouterSpec = spec(json!({"name": "edge", "external_gateway": true}));

        let err = RouterHandler.create(&scope(&mock), &spec).await.unwrap_err();

        assert!(matches!(err, ProviderError::InvalidResource(_)));
        assert_eq!(mock.call_count("create_router"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_on_internal_network_is_refused() {
        let mock = mock();
        let spec: RouterSpec = spec(json!({"name": "edge", "external_gateway": true, "external_id": "net-private"}));

        let err = RouterHandler.create(&scope(&mock), &spec).await.unwrap_err();

        assert!(matches!(err, ProviderError::OpenStack(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_interface_reports_the_router() {
        // Setup
        let mock = mock();
        mock.fail_on("add_router_interface", "subnet is busy");
        let scope = scope(&mock);
        let spec: RouterSpec = spec(json!({"name": "edge", "subnets": ["subnet-a"]}));

        // Execute
        let err = RouterHandler.create(&scope, &spec).await.unwrap_err();

        // Assert: the router exists and delete still removes it
        let (id, state, source) = expect_partial::<RouterState>(err);
        assert!(matches!(source, ProviderError::OpenStack(_)));
        assert_eq!(state.name, "edge");
        assert!(state.interfaces.is_empty());
        assert!(scope.client.get_router(&id).await.is_ok());

        RouterHandler.delete(&scope, &id, &spec, &state).await.unwrap();
        assert!(RouterHandler.read(&scope, &id, &spec, &state).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_swaps_subnets() {
        let mock = mock();
        let scope = scope(&mock);
        let old: RouterSpec = spec(json!({"name": "edge", "subnets": ["subnet-a"]}));
        let (id, prior) = RouterHandler.create(&scope, &old).await.unwrap();

        let new: RouterSpec = spec(json!({"name": "edge-2", "subnets": ["subnet-b"]}));
        let state = RouterHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        assert_eq!(state.name, "edge-2");
        assert_eq!(state.interfaces.len(), 1);
        assert_eq!(state.interfaces[0].subnet_id, "subnet-b");
        assert_eq!(mock.call_count("remove_router_interface"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_change_requires_replacement() {
        let mock = mock();
        let scope = scope(&mock);
        let old: RouterSpec = spec(json!({"name": "edge"}));
        let (id, prior) = RouterHandler.create(&scope, &old).await.unwrap();

        let new: RouterSpec = spec(json!({"name": "edge", "external_gateway": true}));
        let err = RouterHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();

        assert!(matches!(err, ProviderError::RequiresReplacement(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_interfaces_first() {
        let mock = mock().with_delete_polls(2);
        let scope = scope(&mock);
        let spec: RouterSpec = spec(json!({"name": "edge", "subnets": ["subnet-a", "subnet-b"]}));
        let (id, prior) = RouterHandler.create(&scope, &spec).await.unwrap();

        RouterHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert_eq!(mock.call_count("remove_router_interface"), 2);
        assert!(mock.ports().iter().all(|p| p.device_id != id));
        assert!(RouterHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }
}
