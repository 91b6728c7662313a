//! Unit tests for the volume handler

#[cfg(test)]
mod tests {
    use super::super::volume::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::{Volume, VolumeAttachmentInfo};
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_available() {
        let mock = compute_mock();
        let spec: VolumeSpec = spec(json!({"name": "data", "size": 10, "image_name": "cirros"}));

        let (id, state) = VolumeHandler.create(&scope(&mock), &spec).await.unwrap();

        assert_eq!(id, "volume-1");
        assert_eq!(state.status, "available");
        assert_eq!(state.bootable.as_deref(), Some("true"));
        assert!(state.attach.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_attaches_each_server_in_turn() {
        // Setup
        let mock = compute_mock();
        existing_server(&mock, "srv-a");
        existing_server(&mock, "srv-b");
        let spec: VolumeSpec = spec(json!({
            "name": "shared",
            "size": 5,
            "attach": [
                {"instance_id": "srv-a", "device": "/dev/vdc"},
                {"instance_id": "srv-b"}
            ]
        }));

        // Execute
        let (_, state) = VolumeHandler.create(&scope(&mock), &spec).await.unwrap();

        // Assert
        assert_eq!(state.status, "in-use");
        assert_eq!(state.attach.len(), 2);
        assert_eq!(state.attach[0].instance_id, "srv-a");
        assert_eq!(state.attach[0].device.as_deref(), Some("/dev/vdc"));
        assert_eq!(state.attach[1].device.as_deref(), Some("/dev/vdb"));
        assert_eq!(mock.call_count("attach_volume"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_to_missing_server_keeps_the_volume() {
        // Setup
        let mock = compute_mock();
        let scope = scope(&mock);
        let spec: VolumeSpec = spec(json!({"name": "data", "size": 1, "attach": [{"instance_id": "ghost"}]}));

        // Execute
        let err = VolumeHandler.create(&scope, &spec).await.unwrap_err();

        // Assert: the created volume is reported, not orphaned
        let (id, state, source) = expect_partial::<VolumeState>(err);
        assert!(matches!(source, ProviderError::OpenStack(ref e) if e.is_not_found()));
        assert_eq!(state.size, 1);
        assert!(mock.volume(&id).is_some());

        VolumeHandler.delete(&scope, &id, &spec, &state).await.unwrap();
        assert!(mock.volume(&id).is_none());
    }

    #[test]
    fn test_in_use_counts_only_once_the_server_is_attached() {
        let volume = Volume {
            id: "volume-1".to_string(),
            status: "in-use".to_string(),
            attachments: vec![VolumeAttachmentInfo {
                id: "volume-1".to_string(),
                server_id: "srv-a".to_string(),
                device: Some("/dev/vdb".to_string()),
            }],
            ..Default::default()
        };

        // A second attach sees in-use before its own attachment is listed
        assert_eq!(attachment_status(&volume, "srv-b"), "attaching");
        assert_eq!(attachment_status(&volume, "srv-a"), "in-use");

        let available = Volume {
            status: "available".to_string(),
            attachments: Vec::new(),
            ..volume
        };
        assert_eq!(attachment_status(&available, "srv-a"), "available");
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let spec: VolumeSpec = spec(json!({"name": "data", "size": 0}));
        assert!(VolumeHandler.validate(&spec).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_metadata_and_move_attachment() {
        // Setup
        let mock = compute_mock();
        existing_server(&mock, "srv-a");
        existing_server(&mock, "srv-b");
        let scope = scope(&mock);
        let old: VolumeSpec = spec(json!({"name": "data", "size": 5, "attach": [{"instance_id": "srv-a"}]}));
        let (id, prior) = VolumeHandler.create(&scope, &old).await.unwrap();

        let mut new = old.clone();
        new.name = "data-2".to_string();
        new.metadata.insert("backup".to_string(), "daily".to_string());
        new.attach[0].instance_id = "srv-b".to_string();

        // Execute
        let state = VolumeHandler.update(&scope, &id, &old, &new, &prior).await.unwrap();

        // Assert
        assert_eq!(state.name.as_deref(), Some("data-2"));
        assert_eq!(state.metadata["backup"], "daily");
        assert_eq!(state.attach.len(), 1);
        assert_eq!(state.attach[0].instance_id, "srv-b");
        assert_eq!(mock.call_count("detach_volume"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_requires_replacement() {
        let mock = compute_mock();
        let scope = scope(&mock);
        let old: VolumeSpec = spec(json!({"name": "data", "size": 5}));
        let (id, prior) = VolumeHandler.create(&scope, &old).await.unwrap();

        let mut new = old.clone();
        new.size = 20;
        let err = VolumeHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();

        assert!(matches!(err, ProviderError::RequiresReplacement(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_detaches_first() {
        let mock = compute_mock().with_delete_polls(2);
        existing_server(&mock, "srv-a");
        let scope = scope(&mock);
        let spec: VolumeSpec = spec(json!({"name": "data", "size": 5, "attach": [{"instance_id": "srv-a"}]}));
        let (id, prior) = VolumeHandler.create(&scope, &spec).await.unwrap();

        VolumeHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(mock.volume(&id).is_none());
        let calls = mock.calls();
        let detach = calls.iter().position(|c| c == "detach_volume").unwrap();
        let delete = calls.iter().position(|c| c == "delete_volume").unwrap();
        assert!(detach < delete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_missing_volume_is_noop() {
        let mock = compute_mock();
        let scope = scope(&mock);
        let spec: VolumeSpec = spec(json!({"name": "data", "size": 5}));
        let (_, prior) = VolumeHandler.create(&scope, &spec).await.unwrap();

        VolumeHandler.delete(&scope, "volume-404", &spec, &prior).await.unwrap();

        assert_eq!(mock.call_count("delete_volume"), 0);
    }
}
