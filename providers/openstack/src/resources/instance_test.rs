//! Unit tests for the instance handler

#[cfg(test)]
mod tests {
    use super::super::instance::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::{Flavor, ServerAddress};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn web_spec() -> InstanceSpec {
        spec(json!({
            "name": "web",
            "image_name": "cirros",
            "flavor_name": "m1.small",
            "user_data": "hello",
            "metadata": {"role": "web"}
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_resolves_names_and_waits_for_active() {
        // Setup
        let mock = compute_mock();
        let scope = scope(&mock);

        // Execute
        let (id, state) = InstanceHandler.create(&scope, &web_spec()).await.unwrap();

        // Assert
        assert_eq!(id, "server-1");
        assert_eq!(state.status, "ACTIVE");
        assert_eq!(state.image_id.as_deref(), Some("img-1"));
        assert_eq!(state.flavor_id.as_deref(), Some("2"));
        assert_eq!(state.user_data.as_deref(), Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"));
        assert_eq!(state.network_info["private_ipv4"], "10.0.0.3");
        assert_eq!(state.network_info["private_mac"], "fa:16:3e:00:00:01");
        assert_eq!(state.tenant_id, TEST_TENANT);
        // One BUILD read, then ACTIVE
        assert_eq!(mock.call_count("get_server"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_with_unknown_image_never_boots() {
        let mock = compute_mock();
        let mut spec = web_spec();
        spec.image_name = Some("ubuntu".to_string());

        let err = InstanceHandler.create(&scope(&mock), &spec).await.unwrap_err();

        assert!(matches!(err, ProviderError::InvalidResource(ref m) if m.contains("ubuntu")));
        assert_eq!(mock.call_count("create_server"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_flavor_name_is_rejected() {
        let mock = compute_mock();
        mock.add_flavor(Flavor {
            id: "9".to_string(),
            name: "m1.small".to_string(),
            ..Default::default()
        });

        let err = InstanceHandler.create(&scope(&mock), &web_spec()).await.unwrap_err();

        assert!(matches!(err, ProviderError::InvalidResource(ref m) if m.contains("2 flavors")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_skip_name_lookup() {
        let mock = compute_mock();
        let spec: InstanceSpec = spec(json!({"name": "db", "image_id": "img-1", "flavor_id": "3"}));

        let (_, state) = InstanceHandler.create(&scope(&mock), &spec).await.unwrap();

        assert_eq!(state.flavor_id.as_deref(), Some("3"));
        assert_eq!(state.user_data, None);
        assert_eq!(mock.call_count("list_images"), 0);
        assert_eq!(mock.call_count("list_flavors"), 0);
    }

    #[test]
    fn test_validate_requires_image_and_flavor() {
        let no_image: InstanceSpec = spec(json!({"name": "web", "flavor_id": "2"}));
        let no_flavor: InstanceSpec = spec(json!({"name": "web", "image_id": "img-1", "flavor_name": ""}));
        let unnamed: InstanceSpec = spec(json!({"name": "", "image_id": "img-1", "flavor_id": "2"}));

        assert!(InstanceHandler.validate(&no_image).is_err());
        assert!(InstanceHandler.validate(&no_flavor).is_err());
        assert!(InstanceHandler.validate(&unnamed).is_err());
        assert!(InstanceHandler.validate(&web_spec()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_build_reports_the_server() {
        // Setup
        let mock = compute_mock();
        mock.set_settle_status("server", "ERROR");
        let scope = scope(&mock);
        let spec = web_spec();

        // Execute
        let err = InstanceHandler.create(&scope, &spec).await.unwrap_err();

        // Assert: the server in ERROR is still addressable and can be deleted
        let (id, state, source) = expect_partial::<InstanceState>(err);
        assert!(matches!(source, ProviderError::UnexpectedState(ref m) if m.contains("ERROR")));
        assert_eq!(state.name, "web");
        assert!(mock.server(&id).is_some());

        InstanceHandler.delete(&scope, &id, &spec, &state).await.unwrap();
        assert!(mock.server(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_renames_and_replaces_metadata() {
        // Setup
        let mock = compute_mock();
        let scope = scope(&mock);
        let old = web_spec();
        let (id, prior) = InstanceHandler.create(&scope, &old).await.unwrap();

        let mut new = old.clone();
        new.name = "web-2".to_string();
        new.metadata.insert("tier".to_string(), "frontend".to_string());

        // Execute
        let state = InstanceHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        // Assert
        let server = mock.server(&id).unwrap();
        assert_eq!(server.name, "web-2");
        assert_eq!(server.metadata, new.metadata);
        assert_eq!(state.metadata.len(), 2);
        assert_eq!(mock.call_count("set_server_metadata"), 1);
        assert_eq!(mock.call_count("resize_server"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_flavor_resizes_then_confirms() {
        let mock = compute_mock();
        let scope = scope(&mock);
        let old = web_spec();
        let (id, prior) = InstanceHandler.create(&scope, &old).await.unwrap();

        let mut new = old.clone();
        new.flavor_name = Some("m1.medium".to_string());
        let state = InstanceHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        assert_eq!(state.flavor_id.as_deref(), Some("3"));
        assert_eq!(state.status, "ACTIVE");
        let calls = mock.calls();
        let resize = calls.iter().position(|c| c == "resize_server").unwrap();
        let confirm = calls.iter().position(|c| c == "confirm_resize").unwrap();
        assert!(resize < confirm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_image_requires_replacement() {
        let mock = compute_mock();
        let scope = scope(&mock);
        let old = web_spec();
        let (id, prior) = InstanceHandler.create(&scope, &old).await.unwrap();
        let calls_before = mock.calls().len();

        let mut new = old.clone();
        new.image_id = Some("img-2".to_string());
        let err = InstanceHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();

        assert!(matches!(err, ProviderError::RequiresReplacement(ref m) if m.contains("image_id")));
        assert_eq!(mock.calls().len(), calls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_until_server_is_gone() {
        let mock = compute_mock().with_delete_polls(3);
        let scope = scope(&mock);
        let spec = web_spec();
        let (id, prior) = InstanceHandler.create(&scope, &spec).await.unwrap();

        InstanceHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(mock.server(&id).is_none());
        assert!(InstanceHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_missing_server_is_noop() {
        let mock = compute_mock();
        let scope = scope(&mock);
        let spec = web_spec();
        let (_, prior) = InstanceHandler.create(&scope, &spec).await.unwrap();

        InstanceHandler.delete(&scope, "server-404", &spec, &prior).await.unwrap();

        assert_eq!(mock.call_count("delete_server"), 1);
        assert_eq!(mock.call_count("get_server"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_existing_server() {
        let mock = compute_mock();
        existing_server(&mock, "srv-9");
        let spec = web_spec();
        let (_, prior) = InstanceHandler.create(&scope(&mock), &spec).await.unwrap();

        let state = InstanceHandler.read(&scope(&mock), "srv-9", &spec, &prior).await.unwrap().unwrap();

        assert_eq!(state.name, "srv-9");
        assert_eq!(state.status, "ACTIVE");
        assert!(state.network_info.is_empty());
    }

    #[test]
    fn test_network_info_keeps_first_address_and_brackets_ipv6() {
        let mut addresses = BTreeMap::new();
        addresses.insert(
            "public".to_string(),
            vec![
                ServerAddress {
                    addr: "172.24.4.10".to_string(),
                    version: 4,
                    mac_addr: Some("fa:16:3e:aa:bb:cc".to_string()),
                },
                ServerAddress {
                    addr: "172.24.4.11".to_string(),
                    version: 4,
                    mac_addr: Some("fa:16:3e:dd:ee:ff".to_string()),
                },
                ServerAddress {
                    addr: "2001:db8::10".to_string(),
                    version: 6,
                    mac_addr: None,
                },
            ],
        );

        let info = network_info(&addresses);

        assert_eq!(info["public_ipv4"], "172.24.4.10");
        assert_eq!(info["public_mac"], "fa:16:3e:aa:bb:cc");
        assert_eq!(info["public_ipv6"], "[2001:db8::10]");
        assert_eq!(info.len(), 3);
    }
}
