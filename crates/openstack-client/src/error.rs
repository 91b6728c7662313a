//! OpenStack client errors

use thiserror::Error;

/// Errors that can occur when interacting with the OpenStack APIs
#[derive(Debug, Error)]
pub enum OpenStackError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An OpenStack service returned a non-success status
    #[error("OpenStack API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Method, path and response body
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Keystone rejected the credentials, or a service rejected the token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service catalog has no public endpoint for the service in the region
    #[error("No {service} endpoint in region {region}")]
    EndpointNotFound {
        /// Catalog service type
        service: String,
        /// Requested region
        region: String,
    },

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl OpenStackError {
    /// Whether this error is an HTTP 404 from the service.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
