//! Test utilities for unit testing resource handlers
//!
//! This module provides helpers for building scopes over the mock client and
//! seeding common fixtures.

#[cfg(test)]
use crate::context::Scope;
#[cfg(test)]
use crate::error::ProviderError;
#[cfg(test)]
use openstack_client::{Flavor, Image, MockOpenStackClient, Network, Server, Subnet};
#[cfg(test)]
use serde::de::DeserializeOwned;
#[cfg(test)]
use std::sync::Arc;

/// Tenant every test scope is bound to
#[cfg(test)]
pub const TEST_TENANT: &str = "tenant-1";

/// Scope over a clone of `mock` (clones share state)
#[cfg(test)]
pub fn scope(mock: &MockOpenStackClient) -> Scope {
    Scope {
        region: "RegionOne".to_string(),
        tenant_id: TEST_TENANT.to_string(),
        client: Arc::new(mock.clone()),
    }
}

/// Deserialize a resource spec from inline JSON
#[cfg(test)]
pub fn spec<T: DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).expect("spec should deserialize")
}

/// Split the error of a create that failed after the resource existed into
/// the created id, the state recorded so far and the failure itself
#[cfg(test)]
pub fn expect_partial<T: DeserializeOwned>(err: ProviderError) -> (String, T, ProviderError) {
    match err {
        ProviderError::Partial { id, attributes, source } => {
            let state = serde_json::from_value(attributes).expect("partial state should deserialize");
            (id, state, *source)
        }
        other => panic!("expected a partially created resource, got: {other}"),
    }
}

/// Mock with a flavor `m1.small` (id `2`) and an image `cirros` (id `img-1`)
#[cfg(test)]
pub fn compute_mock() -> MockOpenStackClient {
    let mock = MockOpenStackClient::new("RegionOne").with_tenant(TEST_TENANT);
    mock.add_flavor(Flavor {
        id: "2".to_string(),
        name: "m1.small".to_string(),
        ram: 2048,
        vcpus: 1,
        disk: 20,
    });
    mock.add_flavor(Flavor {
        id: "3".to_string(),
        name: "m1.medium".to_string(),
        ram: 4096,
        vcpus: 2,
        disk: 40,
    });
    mock.add_image(Image {
        id: "img-1".to_string(),
        name: "cirros".to_string(),
        status: "ACTIVE".to_string(),
    });
    mock
}

/// An ACTIVE server already present in the cloud
#[cfg(test)]
pub fn existing_server(mock: &MockOpenStackClient, id: &str) {
    mock.add_server(Server {
        id: id.to_string(),
        name: id.to_string(),
        status: "ACTIVE".to_string(),
        tenant_id: TEST_TENANT.to_string(),
        ..Default::default()
    });
}

/// An external network `public` plus a private network with one subnet
#[cfg(test)]
pub fn seed_networks(mock: &MockOpenStackClient) {
    mock.add_network(Network {
        id: "net-public".to_string(),
        name: "public".to_string(),
        admin_state_up: true,
        status: "ACTIVE".to_string(),
        external: true,
        ..Default::default()
    });
    mock.add_network(Network {
        id: "net-private".to_string(),
        name: "private".to_string(),
        admin_state_up: true,
        status: "ACTIVE".to_string(),
        subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        ..Default::default()
    });
    for (id, cidr, gateway) in [("subnet-a", "10.0.0.0/24", "10.0.0.1"), ("subnet-b", "10.0.1.0/24", "10.0.1.1")] {
        mock.add_subnet(Subnet {
            id: id.to_string(),
            name: id.to_string(),
            network_id: "net-private".to_string(),
            cidr: cidr.to_string(),
            ip_version: 4,
            enable_dhcp: true,
            gateway_ip: Some(gateway.to_string()),
            tenant_id: TEST_TENANT.to_string(),
        });
    }
}
