//! Unit tests for the keypair handler

#[cfg(test)]
mod tests {
    use super::super::keypair::*;
    use crate::error::ProviderError;
    use crate::provider::ResourceHandler;
    use crate::test_utils::*;
    use openstack_client::{MockOpenStackClient, OpenStackError};
    use serde_json::json;

    fn deployer() -> KeypairSpec {
        spec(json!({"name": "deployer", "public_key": "ssh-ed25519 AAAAC3Nza deployer@host"}))
    }

    #[tokio::test]
    async fn test_create_uses_name_as_id() {
        let mock = MockOpenStackClient::new("RegionOne");

        let (id, state) = KeypairHandler.create(&scope(&mock), &deployer()).await.unwrap();

        assert_eq!(id, "deployer");
        assert_eq!(state.public_key, "ssh-ed25519 AAAAC3Nza deployer@host");
        assert!(state.fingerprint.starts_with("fp:"));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let mock = MockOpenStackClient::new("RegionOne");
        KeypairHandler.create(&scope(&mock), &deployer()).await.unwrap();

        let err = KeypairHandler.create(&scope(&mock), &deployer()).await.unwrap_err();

        assert!(matches!(err, ProviderError::OpenStack(OpenStackError::Api { status: 409, .. })));
    }

    #[tokio::test]
    async fn test_any_change_requires_replacement() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let old = deployer();
        let (id, prior) = KeypairHandler.create(&scope, &old).await.unwrap();

        let unchanged = KeypairHandler.update(&scope, &id, &old, &old, &prior).await.unwrap();
        assert_eq!(unchanged, prior);

        let mut new = old.clone();
        new.public_key = "ssh-rsa BBBB".to_string();
        let err = KeypairHandler.update(&scope, &id, &old, &new, &prior).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplacement(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mock = MockOpenStackClient::new("RegionOne");
        let scope = scope(&mock);
        let spec = deployer();
        let (id, prior) = KeypairHandler.create(&scope, &spec).await.unwrap();

        KeypairHandler.delete(&scope, &id, &spec, &prior).await.unwrap();
        KeypairHandler.delete(&scope, &id, &spec, &prior).await.unwrap();

        assert!(KeypairHandler.read(&scope, &id, &spec, &prior).await.unwrap().is_none());
    }

    #[test]
    fn test_validate_rejects_blank_key() {
        let spec: KeypairSpec = spec(json!({"name": "deployer", "public_key": "  "}));
        assert!(KeypairHandler.validate(&spec).is_err());
    }
}
