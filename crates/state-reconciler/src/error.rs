//! Reconciler errors

use crate::request::TargetStatus;
use crate::source::Observation;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A [`ReconciliationRequest`](crate::ReconciliationRequest) violated one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid reconciliation request: {0}")]
pub struct InvalidRequest(pub String);

/// Errors that end a reconciliation without reaching the target.
///
/// `T` is the caller's entity type, `E` the caller's fetch error type.
#[derive(Debug, Error)]
pub enum ReconcileError<T: fmt::Debug, E: std::error::Error + 'static> {
    /// Deadline passed while the status stayed pending
    #[error(
        "Timeout after {timeout:?} waiting for {entity_id} to become {target} (last status: {})",
        last_status(.last)
    )]
    Timeout {
        /// Polled entity
        entity_id: String,
        /// Status that was awaited
        target: TargetStatus,
        /// Configured timeout
        timeout: Duration,
        /// Last observation before the deadline, if any fetch happened
        last: Option<Observation<T>>,
    },

    /// Status left the pending set without reaching the target
    #[error("Unexpected state {status:?} for {entity_id}, wanted {target}")]
    UnexpectedState {
        /// Polled entity
        entity_id: String,
        /// Status that was awaited
        target: TargetStatus,
        /// Status actually observed
        status: String,
        /// Entity as returned with that status
        entity: T,
    },

    /// Entity disappeared while waiting for something other than deletion
    #[error("{entity_id} not found while waiting for {target}")]
    NotFound {
        /// Polled entity
        entity_id: String,
        /// Status that was awaited
        target: TargetStatus,
    },

    /// Fetch failed for a reason other than "not found"; passed through as-is
    #[error(transparent)]
    Fetch(E),
}

impl<T: fmt::Debug, E: std::error::Error + 'static> ReconcileError<T, E> {
    /// Last status observed before the failure, when there was one.
    #[must_use]
    pub fn observed_status(&self) -> Option<&str> {
        match self {
            Self::Timeout { last, .. } => last.as_ref().map(|o| o.status.as_str()),
            Self::UnexpectedState { status, .. } => Some(status),
            Self::NotFound { .. } | Self::Fetch(_) => None,
        }
    }
}

fn last_status<T>(last: &Option<Observation<T>>) -> &str {
    last.as_ref().map_or("none", |o| o.status.as_str())
}
