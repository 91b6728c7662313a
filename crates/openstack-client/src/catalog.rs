//! Keystone service catalog and per-region endpoint selection

use crate::error::OpenStackError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Region used when neither the resource nor the provider names one
pub const DEFAULT_REGION: &str = "RegionOne";

/// One service's public endpoint in one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub region: String,
    pub url: String,
}

/// A catalog entry: the service type and its public endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub service_type: String,
    pub endpoints: Vec<Endpoint>,
}

/// Normalized service catalog (same shape for Keystone v2.0 and v3)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    /// Public URL of `service_type` in `region`, if the catalog has one.
    #[must_use]
    pub fn public_url(&self, service_type: &str, region: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.service_type == service_type)
            .flat_map(|e| e.endpoints.iter())
            .find(|ep| ep.region == region)
            .map(|ep| ep.url.as_str())
    }
}

/// OpenStack services this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    /// Nova (servers, flavors, images, keypairs, security groups, nova-network)
    Compute,
    /// Cinder v1 volumes
    BlockStorage,
    /// Neutron v2.0
    Network,
    /// Swift
    ObjectStorage,
}

/// Endpoint resolved for one service in one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub kind: ServiceKind,
    pub region: String,
    pub url: String,
}

impl ServiceKind {
    /// Every service kind, in catalog order
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Compute,
        ServiceKind::BlockStorage,
        ServiceKind::Network,
        ServiceKind::ObjectStorage,
    ];

    /// Keystone catalog `type` of this service
    #[must_use]
    pub fn catalog_type(self) -> &'static str {
        match self {
            ServiceKind::Compute => "compute",
            ServiceKind::BlockStorage => "volume",
            ServiceKind::Network => "network",
            ServiceKind::ObjectStorage => "object-store",
        }
    }

    /// Pick the public endpoint for `region` from the catalog.
    ///
    /// The network catalog entry points at the API root, so the `v2.0/`
    /// version suffix is appended.
    ///
    /// # Errors
    ///
    /// [`OpenStackError::EndpointNotFound`] when the catalog has no public
    /// endpoint for this service in the region.
    pub fn resolve(self, catalog: &ServiceCatalog, region: &str) -> Result<ServiceEndpoint, OpenStackError> {
        let url = catalog
            .public_url(self.catalog_type(), region)
            .ok_or_else(|| OpenStackError::EndpointNotFound {
                service: self.catalog_type().to_string(),
                region: region.to_string(),
            })?;

        let url = match self {
            ServiceKind::Network => format!("{}/v2.0/", url.trim_end_matches('/')),
            _ => url.to_string(),
        };

        Ok(ServiceEndpoint {
            kind: self,
            region: region.to_string(),
            url,
        })
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_type())
    }
}
