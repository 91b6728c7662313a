//! The polling loop.

use crate::backoff::PollBackoff;
use crate::error::ReconcileError;
use crate::request::ReconciliationRequest;
use crate::source::{FetchError, Observation, StatusSource};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// How a successful reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The entity reported the target status
    Reached {
        /// Final status (equal to the target)
        status: String,
        /// Entity as returned with the final status
        entity: T,
    },
    /// The entity is gone, as requested
    Deleted,
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciled<T> {
    /// Terminal outcome
    pub outcome: Outcome<T>,
    /// Number of fetches performed
    pub polls: u32,
    /// Wall-clock time spent, including the initial delay
    pub elapsed: Duration,
}

impl<T> Reconciled<T> {
    /// The final entity, unless the outcome was a deletion.
    pub fn into_entity(self) -> Option<T> {
        match self.outcome {
            Outcome::Reached { entity, .. } => Some(entity),
            Outcome::Deleted => None,
        }
    }

    /// The final status; `DELETED` for deletions.
    #[must_use]
    pub fn status(&self) -> &str {
        match &self.outcome {
            Outcome::Reached { status, .. } => status,
            Outcome::Deleted => "DELETED",
        }
    }
}

/// Block until the entity in `req` reaches its target, is confirmed deleted,
/// leaves the pending set, or the timeout passes.
///
/// Fetch failures other than "not found" are returned unmodified and never
/// retried; only pending statuses are retried.
///
/// # Errors
///
/// See [`ReconcileError`] for the distinct failure kinds.
pub async fn wait_for_state<S>(
    req: &ReconciliationRequest,
    source: &S,
) -> Result<Reconciled<S::Entity>, ReconcileError<S::Entity, S::Error>>
where
    S: StatusSource + ?Sized,
{
    let started = Instant::now();
    let deadline = started + req.timeout();
    let entity_id = req.entity_id();

    debug!(
        "Waiting for {} to become {} (pending: {:?}, timeout: {:?})",
        entity_id,
        req.target(),
        req.pending(),
        req.timeout()
    );

    if !req.initial_delay().is_zero() {
        sleep(req.initial_delay()).await;
    }

    let mut backoff = PollBackoff::new(req.poll_interval(), req.max_poll_interval());
    let mut last: Option<Observation<S::Entity>> = None;
    let mut polls: u32 = 0;

    loop {
        if Instant::now() >= deadline {
            warn!(
                "Timed out after {:?} waiting for {} to become {}",
                req.timeout(),
                entity_id,
                req.target()
            );
            return Err(ReconcileError::Timeout {
                entity_id: entity_id.to_string(),
                target: req.target().clone(),
                timeout: req.timeout(),
                last,
            });
        }

        polls += 1;
        match source.fetch_status(entity_id).await {
            Err(FetchError::NotFound) if req.target().is_deleted() => {
                info!("{} is gone after {} poll(s)", entity_id, polls);
                return Ok(Reconciled {
                    outcome: Outcome::Deleted,
                    polls,
                    elapsed: started.elapsed(),
                });
            }
            Err(FetchError::NotFound) => {
                warn!("{} disappeared while waiting for {}", entity_id, req.target());
                return Err(ReconcileError::NotFound {
                    entity_id: entity_id.to_string(),
                    target: req.target().clone(),
                });
            }
            Err(FetchError::Failed(e)) => {
                warn!("Failed to fetch status of {}: {}", entity_id, e);
                return Err(ReconcileError::Fetch(e));
            }
            Ok(observation) => {
                debug!("{} status: {}", entity_id, observation.status);

                if req.target().matches(&observation.status) {
                    info!(
                        "{} reached {} after {} poll(s)",
                        entity_id, observation.status, polls
                    );
                    let outcome = if req.target().is_deleted() {
                        Outcome::Deleted
                    } else {
                        Outcome::Reached {
                            status: observation.status,
                            entity: observation.entity,
                        }
                    };
                    return Ok(Reconciled {
                        outcome,
                        polls,
                        elapsed: started.elapsed(),
                    });
                }

                if !req.is_pending(&observation.status) {
                    warn!(
                        "{} entered unexpected state {} while waiting for {}",
                        entity_id,
                        observation.status,
                        req.target()
                    );
                    return Err(ReconcileError::UnexpectedState {
                        entity_id: entity_id.to_string(),
                        target: req.target().clone(),
                        status: observation.status,
                        entity: observation.entity,
                    });
                }

                last = Some(observation);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(backoff.next_backoff().min(remaining)).await;
    }
}

impl ReconciliationRequest {
    /// Run this request against `source`. Shorthand for [`wait_for_state`].
    ///
    /// # Errors
    ///
    /// See [`ReconcileError`].
    pub async fn wait<S>(
        &self,
        source: &S,
    ) -> Result<Reconciled<S::Entity>, ReconcileError<S::Entity, S::Error>>
    where
        S: StatusSource + ?Sized,
    {
        wait_for_state(self, source).await
    }
}
