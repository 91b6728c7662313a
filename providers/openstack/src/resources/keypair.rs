//! `openstack_keypair`: a Nova SSH key pair, identified by its name

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, ignore_not_found, immutable};
use openstack_client::Keypair;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeypairSpec {
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairState {
    pub name: String,
    pub public_key: String,
    pub fingerprint: String,
    pub user_id: Option<String>,
}

impl From<Keypair> for KeypairState {
    fn from(keypair: Keypair) -> Self {
        Self {
            name: keypair.name,
            public_key: keypair.public_key,
            fingerprint: keypair.fingerprint,
            user_id: keypair.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeypairHandler;

#[async_trait::async_trait]
impl ResourceHandler for KeypairHandler {
    type Spec = KeypairSpec;
    type State = KeypairState;

    fn validate(&self, spec: &KeypairSpec) -> Result<(), ProviderError> {
        if spec.name.is_empty() || spec.public_key.trim().is_empty() {
            return Err(ProviderError::InvalidResource(
                "keypair needs a name and a public_key".to_string(),
            ));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &KeypairSpec) -> Result<(String, KeypairState), ProviderError> {
        let keypair = scope.client.create_keypair(&spec.name, &spec.public_key).await?;
        info!("Key pair {} imported ({})", keypair.name, keypair.fingerprint);
        Ok((keypair.name.clone(), keypair.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &KeypairSpec, _prior: &KeypairState) -> Result<Option<KeypairState>, ProviderError> {
        Ok(found(scope.client.get_keypair(id).await)?.map(Into::into))
    }

    async fn update(&self, _scope: &Scope, _id: &str, old: &KeypairSpec, new: &KeypairSpec, prior: &KeypairState) -> Result<KeypairState, ProviderError> {
        immutable("name", &old.name, &new.name)?;
        immutable("public_key", &old.public_key, &new.public_key)?;
        Ok(prior.clone())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &KeypairSpec, _prior: &KeypairState) -> Result<(), ProviderError> {
        ignore_not_found(scope.client.delete_keypair(id).await)
    }
}
