//! Provider-specific error types.
//!
//! This module defines the errors surfaced by the OpenStack provider that are
//! not covered by the client or reconciler crates.

use crate::provider::StateRecord;
use openstack_client::OpenStackError;
use state_reconciler::{InvalidRequest, ReconcileError};
use std::fmt;
use thiserror::Error;

/// Errors that can occur in the OpenStack provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// OpenStack API error
    #[error("OpenStack error: {0}")]
    OpenStack(#[from] OpenStackError),

    /// Invalid provider configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource document or state record does not describe a valid resource
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// A field changed that cannot be updated in place
    #[error("Change requires replacing the resource: {0}")]
    RequiresReplacement(String),

    /// Waiting for a status ran out of time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The resource settled on a status other than the one wanted
    #[error("Unexpected state: {0}")]
    UnexpectedState(String),

    /// The resource disappeared while a status other than deletion was awaited
    #[error("Resource vanished: {0}")]
    Vanished(String),

    /// A handler created the resource, then a later step of the create failed.
    /// `attributes` holds the state observed so far.
    #[error("{id} was created but not completed: {source}")]
    Partial {
        id: String,
        attributes: serde_json::Value,
        source: Box<ProviderError>,
    },

    /// Create failed after the resource existed. The record still addresses
    /// it, so a later read or delete can act on it.
    #[error("Create left the resource incomplete: {source}")]
    Incomplete {
        record: Box<StateRecord>,
        source: Box<ProviderError>,
    },

    /// Reconciliation request built with inconsistent parameters
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<T: fmt::Debug> From<ReconcileError<T, OpenStackError>> for ProviderError {
    fn from(err: ReconcileError<T, OpenStackError>) -> Self {
        let message = err.to_string();
        match err {
            ReconcileError::Fetch(e) => Self::OpenStack(e),
            ReconcileError::Timeout { .. } => Self::Timeout(message),
            ReconcileError::UnexpectedState { .. } => Self::UnexpectedState(message),
            ReconcileError::NotFound { .. } => Self::Vanished(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_reconciler::{Observation, TargetStatus};
    use std::time::Duration;

    #[test]
    fn test_fetch_error_passes_through() {
        let err: ProviderError = ReconcileError::<(), _>::Fetch(OpenStackError::NotFound("x".to_string())).into();
        assert!(matches!(err, ProviderError::OpenStack(OpenStackError::NotFound(_))));
    }

    #[test]
    fn test_timeout_keeps_last_status() {
        let err: ProviderError = ReconcileError::<(), OpenStackError>::Timeout {
            entity_id: "srv-1".to_string(),
            target: TargetStatus::status("ACTIVE"),
            timeout: Duration::from_secs(60),
            last: Some(Observation::new("BUILD", ())),
        }
        .into();
        match err {
            ProviderError::Timeout(message) => assert!(message.contains("last status: BUILD")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unexpected_state() {
        let err: ProviderError = ReconcileError::<(), OpenStackError>::UnexpectedState {
            entity_id: "srv-1".to_string(),
            target: TargetStatus::status("ACTIVE"),
            status: "ERROR".to_string(),
            entity: (),
        }
        .into();
        assert!(matches!(err, ProviderError::UnexpectedState(ref m) if m.contains("ERROR")));
    }
}
