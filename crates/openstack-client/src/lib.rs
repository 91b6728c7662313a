//! OpenStack API Client
//!
//! A Rust client for the parts of OpenStack a resource provider needs:
//! Keystone authentication (v2.0 and v3), Nova compute, Cinder block storage
//! and Neutron networking (including FWaaS and LBaaS v1).
//!
//! # Example
//!
//! ```no_run
//! use openstack_client::{AuthOptions, Cloud, CloudConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = AuthOptions {
//!     auth_url: "https://keystone.example.com:5000/v2.0".to_string(),
//!     username: Some("demo".to_string()),
//!     password: "secret".to_string(),
//!     tenant_name: Some("demo".to_string()),
//!     ..Default::default()
//! };
//!
//! // Authenticate once, then get a client for a region
//! let cloud = Cloud::connect(&opts).await?;
//! let client = cloud.client_for("RegionOne").await?;
//!
//! let flavors = client.list_flavors().await?;
//! println!("{} flavors", flavors.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Service catalog**: endpoints are resolved per region from the token
//! - **Mockable**: every operation goes through [`OpenStackClientTrait`]
//! - **test-util**: an in-memory [`MockOpenStackClient`] with scripted status
//!   transitions for handler tests

pub mod auth;
pub mod catalog;
pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod openstack_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use auth::{AuthOptions, IdentityVersion, Session, authenticate};
pub use catalog::{DEFAULT_REGION, ServiceCatalog, ServiceEndpoint, ServiceKind};
pub use client::{Cloud, OpenStackClient};
pub use common::HttpClient;
pub use error::OpenStackError;
pub use models::*;
pub use openstack_trait::{CloudConnector, OpenStackClientTrait};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCloud, MockOpenStackClient};
