//! Per-invocation provider context
//!
//! Built once from a validated configuration and an authenticated cloud,
//! then passed by reference to every resource operation.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use openstack_client::{CloudConnector, DEFAULT_REGION, OpenStackClientTrait};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared state for one provider invocation
#[derive(Clone)]
pub struct ProviderContext {
    config: ProviderConfig,
    cloud: Arc<dyn CloudConnector>,
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("config", &self.config)
            .field("tenant_id", &self.cloud.tenant_id())
            .finish_non_exhaustive()
    }
}

/// Where a single resource lives: its region, a client bound to it and the
/// session tenant
#[derive(Clone)]
pub struct Scope {
    pub region: String,
    pub tenant_id: String,
    pub client: Arc<dyn OpenStackClientTrait>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("region", &self.region)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl ProviderContext {
    pub fn new(config: ProviderConfig, cloud: Arc<dyn CloudConnector>) -> Self {
        Self { config, cloud }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Region for a resource: its own `region`, then the configured region,
    /// then `RegionOne`.
    pub fn region_for(&self, resource_region: Option<&str>) -> String {
        resource_region
            .filter(|r| !r.is_empty())
            .or(self.config.region.as_deref())
            .unwrap_or(DEFAULT_REGION)
            .to_string()
    }

    /// Resolve the scope for a resource
    ///
    /// # Errors
    ///
    /// Fails when the cloud has no endpoints for the resolved region.
    pub async fn scope(&self, resource_region: Option<&str>) -> Result<Scope, ProviderError> {
        let region = self.region_for(resource_region);
        debug!("Resolving clients for region {}", region);
        let client = self.cloud.client_for(&region).await?;
        Ok(Scope {
            region,
            tenant_id: self.cloud.tenant_id().to_string(),
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_client::{MockCloud, MockOpenStackClient};

    fn context(region: Option<&str>) -> ProviderContext {
        let config = ProviderConfig {
            region: region.map(str::to_string),
            ..Default::default()
        };
        let cloud = MockCloud::new("t-1")
            .with_client(MockOpenStackClient::new("RegionOne"))
            .with_client(MockOpenStackClient::new("RegionTwo"));
        ProviderContext::new(config, Arc::new(cloud))
    }

    #[test]
    fn test_region_precedence() {
        assert_eq!(context(None).region_for(None), "RegionOne");
        assert_eq!(context(Some("RegionTwo")).region_for(None), "RegionTwo");
        assert_eq!(context(Some("RegionTwo")).region_for(Some("RegionThree")), "RegionThree");
        assert_eq!(context(Some("RegionTwo")).region_for(Some("")), "RegionTwo");
    }

    #[tokio::test]
    async fn test_scope_binds_region_and_tenant() {
        let scope = context(Some("RegionTwo")).scope(None).await.unwrap();
        assert_eq!(scope.region, "RegionTwo");
        assert_eq!(scope.client.region(), "RegionTwo");
        assert_eq!(scope.tenant_id, "t-1");
    }

    #[tokio::test]
    async fn test_unknown_region() {
        let err = context(None).scope(Some("Nowhere")).await.unwrap_err();
        assert!(matches!(err, ProviderError::OpenStack(_)));
    }
}
