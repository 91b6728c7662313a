//! Reconciliation request and its builder.

use crate::error::InvalidRequest;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default ceiling for the poll backoff.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Status that ends a reconciliation successfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    /// The entity reports exactly this status.
    Status(String),
    /// The entity is gone (the fetch reports "not found").
    Deleted,
}

impl TargetStatus {
    /// Target a concrete status value.
    pub fn status(status: impl Into<String>) -> Self {
        Self::Status(status.into())
    }

    /// Whether this target confirms deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Whether an observed status satisfies the target.
    ///
    /// A literal `DELETED` status counts as confirmation for deletion waits,
    /// since some services report it briefly before returning 404.
    #[must_use]
    pub fn matches(&self, observed: &str) -> bool {
        match self {
            Self::Status(expected) => expected == observed,
            Self::Deleted => observed.eq_ignore_ascii_case("deleted"),
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => f.write_str(status),
            Self::Deleted => f.write_str("DELETED"),
        }
    }
}

/// One polling operation: which entity, what counts as in-progress, what
/// counts as done, and how long to keep looking.
///
/// Built through [`ReconciliationRequest::builder`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct ReconciliationRequest {
    entity_id: String,
    pending: BTreeSet<String>,
    target: TargetStatus,
    timeout: Duration,
    initial_delay: Duration,
    poll_interval: Duration,
    max_poll_interval: Duration,
}

impl ReconciliationRequest {
    /// Start building a request for `entity_id` that succeeds on `target`.
    pub fn builder(entity_id: impl Into<String>, target: TargetStatus) -> ReconciliationRequestBuilder {
        ReconciliationRequestBuilder {
            entity_id: entity_id.into(),
            pending: BTreeSet::new(),
            target,
            timeout: None,
            initial_delay: Duration::ZERO,
            poll_interval: None,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }

    /// Identifier of the polled entity
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Statuses meaning "still in progress"
    #[must_use]
    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// Status meaning "done"
    #[must_use]
    pub fn target(&self) -> &TargetStatus {
        &self.target
    }

    /// Maximum wall-clock time to wait
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait before the first poll
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Minimum time between polls
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Ceiling for the poll backoff
    #[must_use]
    pub fn max_poll_interval(&self) -> Duration {
        self.max_poll_interval
    }

    /// Whether `status` is one of the in-progress statuses.
    #[must_use]
    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.contains(status)
    }
}

/// Builder for [`ReconciliationRequest`]. Validates invariants in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ReconciliationRequestBuilder {
    entity_id: String,
    pending: BTreeSet<String>,
    target: TargetStatus,
    timeout: Option<Duration>,
    initial_delay: Duration,
    poll_interval: Option<Duration>,
    max_poll_interval: Duration,
}

impl ReconciliationRequestBuilder {
    /// Add statuses considered "still in progress".
    #[must_use]
    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Maximum wall-clock duration to wait (required, must be non-zero).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Duration to wait before the first poll (defaults to zero).
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Minimum duration between polls (required, must be non-zero).
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Ceiling for the poll backoff. Raised to the poll interval if lower.
    #[must_use]
    pub fn max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    /// Validate and freeze the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequest`] when the entity id is empty, the timeout or
    /// poll interval is missing or zero, or a pending status equals the target.
    pub fn build(self) -> Result<ReconciliationRequest, InvalidRequest> {
        if self.entity_id.is_empty() {
            return Err(InvalidRequest("entity id must not be empty".to_string()));
        }

        let timeout = match self.timeout {
            Some(t) if !t.is_zero() => t,
            _ => return Err(InvalidRequest("timeout must be greater than zero".to_string())),
        };

        let poll_interval = match self.poll_interval {
            Some(i) if !i.is_zero() => i,
            _ => {
                return Err(InvalidRequest(
                    "poll interval must be greater than zero".to_string(),
                ));
            }
        };

        if let TargetStatus::Status(target) = &self.target {
            if self.pending.contains(target) {
                return Err(InvalidRequest(format!(
                    "target status {target:?} is also listed as pending"
                )));
            }
        }

        Ok(ReconciliationRequest {
            entity_id: self.entity_id,
            pending: self.pending,
            target: self.target,
            timeout,
            initial_delay: self.initial_delay,
            poll_interval,
            max_poll_interval: self.max_poll_interval.max(poll_interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(target: TargetStatus) -> ReconciliationRequestBuilder {
        ReconciliationRequest::builder("server-1", target)
            .pending(["BUILD"])
            .timeout(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(3))
    }

    #[test]
    fn test_build_valid_request() {
        let req = base(TargetStatus::status("ACTIVE"))
            .initial_delay(Duration::from_secs(10))
            .build()
            .expect("valid request");

        assert_eq!(req.entity_id(), "server-1");
        assert!(req.is_pending("BUILD"));
        assert!(!req.is_pending("ACTIVE"));
        assert_eq!(req.target(), &TargetStatus::status("ACTIVE"));
        assert_eq!(req.initial_delay(), Duration::from_secs(10));
        assert_eq!(req.max_poll_interval(), DEFAULT_MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_target_in_pending_rejected() {
        let err = base(TargetStatus::status("BUILD")).build().unwrap_err();
        assert!(err.0.contains("pending"), "unexpected message: {err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = base(TargetStatus::Deleted)
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.0.contains("timeout"));
    }

    #[test]
    fn test_missing_poll_interval_rejected() {
        let err = ReconciliationRequest::builder("vol-1", TargetStatus::status("available"))
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(err.0.contains("poll interval"));
    }

    #[test]
    fn test_empty_entity_id_rejected() {
        let err = ReconciliationRequest::builder("", TargetStatus::Deleted)
            .timeout(Duration::from_secs(1))
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap_err();
        assert!(err.0.contains("entity id"));
    }

    #[test]
    fn test_max_poll_interval_raised_to_floor() {
        let req = base(TargetStatus::status("ACTIVE"))
            .max_poll_interval(Duration::from_secs(1))
            .build()
            .expect("valid request");
        assert_eq!(req.max_poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_deleted_target_matches_literal_status() {
        assert!(TargetStatus::Deleted.matches("DELETED"));
        assert!(TargetStatus::Deleted.matches("deleted"));
        assert!(!TargetStatus::Deleted.matches("DELETING"));
        assert!(TargetStatus::status("in-use").matches("in-use"));
        assert!(!TargetStatus::status("ACTIVE").matches("active"));
    }
}
