//! Unit tests for the subnet handler

#[cfg(test)]
mod tests {
    use super::super::subnet::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::MockOpenStackClient;
    use serde_json::json;

    fn app_subnet() -> SubnetSpec {
        spec(json!({"network_id": "net-private", "name": "app", "cidr": "10.0.2.0/24"}))
    }

    #[tokio::test]
    async fn test_create_on_existing_network() {
        let mock = MockOpenStackClient::new("RegionOne");
        seed_networks(&mock);

        let (id, state) = SubnetHandler.create(&scope(&mock), &app_subnet()).await.unwrap();

        assert_eq!(state.ip_version, 4);
        assert!(state.enable_dhcp);
        assert_eq!(state.gateway_ip, None);
        let network = scope(&mock).client.get_network("net-private").await.unwrap();
        assert!(network.subnets.contains(&id));
    }

    #[tokio::test]
    async fn test_create_on_missing_network_fails() {
        let mock = MockOpenStackClient::new("RegionOne");

        let err = SubnetHandler.create(&scope(&mock), &app_subnet()).await.unwrap_err();

        assert!(matches!(err, ProviderError::OpenStack(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_validate_ip_version() {
        let v5: SubnetSpec = spec(json!({"network_id": "n", "cidr": "10.0.0.0/24", "ip_version": 5}));
        let v6: SubnetSpec = spec(json!({"network_id": "n", "cidr": "fd00::/64", "ip_version": 6}));

        assert!(SubnetHandler.validate(&v5).is_err());
        assert!(SubnetHandler.validate(&v6).is_ok());
    }

    #[tokio::test]
    async fn test_update_dhcp_in_place_but_not_cidr() {
        let mock = MockOpenStackClient::new("RegionOne");
        seed_networks(&mock);
        let scope = scope(&mock);
        let old = app_subnet();
        let (id, prior) = SubnetHandler.create(&scope, &old).await.unwrap();

        let mut new = old.clone();
        new.enable_dhcp = false;
        let state = SubnetHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();
        assert!(!state.enable_dhcp);

        let mut moved = old.clone();
        moved.cidr = "10.0.3.0/24".to_string();
        let err = SubnetHandler.update(&scope, &id, &old, &moved, &prior).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplacement(ref m) if m.contains("cidr")));
    }

    #[tokio::test]
    async fn test_delete_detaches_from_network() {
        let mock = MockOpenStackClient::new("RegionOne");
        seed_networks(&mock);
        let scope = scope(&mock);
        let spec = app_subnet();
        let (id, prior) = SubnetHandler.create(&scope, &spec).await.unwrap();

        SubnetHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        let network = scope.client.get_network("net-private").await.unwrap();
        assert!(!network.subnets.contains(&id));
        assert!(SubnetHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }
}
