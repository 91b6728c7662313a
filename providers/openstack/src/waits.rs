//! Wait profiles and the bridge from client reads to the reconciler
//!
//! Every mutating call is followed by [`wait_for`], which polls a read
//! operation until the resource reaches its target status.

use crate::error::ProviderError;
use openstack_client::OpenStackError;
use state_reconciler::{FetchError, Observation, ReconciliationRequest, TargetStatus, source_fn};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Timing for one kind of wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitProfile {
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub poll_interval: Duration,
}

impl WaitProfile {
    const fn new(timeout_secs: u64, initial_delay_secs: u64, poll_interval_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            initial_delay: Duration::from_secs(initial_delay_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }
}

/// Server boot, resize and delete
pub const COMPUTE: WaitProfile = WaitProfile::new(30 * 60, 10, 3);
/// Volume create, attach, detach and delete
pub const VOLUME: WaitProfile = WaitProfile::new(30 * 60, 5, 2);
/// Router create and delete
pub const ROUTER: WaitProfile = WaitProfile::new(10 * 60, 2, 2);
/// Firewall create and delete
pub const FIREWALL: WaitProfile = WaitProfile::new(2 * 60, 0, 2);
/// LBaaS pool create and delete
pub const LBAAS: WaitProfile = WaitProfile::new(10 * 60, 2, 2);

/// Poll `fetch` until `id` reaches `target`.
///
/// `fetch` returns the observed status with the entity. Returns the final
/// entity, or `None` when the target was deletion.
///
/// # Errors
///
/// Timeouts, unexpected statuses and fetch failures, mapped into
/// [`ProviderError`].
pub async fn wait_for<T, F, Fut>(
    id: &str,
    pending: &[&str],
    target: TargetStatus,
    profile: WaitProfile,
    fetch: F,
) -> Result<Option<T>, ProviderError>
where
    T: fmt::Debug + Send,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(String, T), OpenStackError>> + Send,
{
    let request = ReconciliationRequest::builder(id, target)
        .pending(pending.iter().copied())
        .timeout(profile.timeout)
        .initial_delay(profile.initial_delay)
        .poll_interval(profile.poll_interval)
        .build()?;

    let source = source_fn(|entity_id: String| {
        let fut = fetch(entity_id);
        async move {
            match fut.await {
                Ok((status, entity)) => Ok(Observation::new(status, entity)),
                Err(e) if e.is_not_found() => Err(FetchError::NotFound),
                Err(e) => Err(FetchError::Failed(e)),
            }
        }
    });

    let reconciled = request.wait(&source).await?;
    info!(
        "{} reached {} after {} polls ({:?})",
        id,
        reconciled.status(),
        reconciled.polls,
        reconciled.elapsed
    );
    Ok(reconciled.into_entity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_reaches_target() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let entity = wait_for("srv-1", &["BUILD"], TargetStatus::status("ACTIVE"), COMPUTE, move |_id| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let status = if n < 2 { "BUILD" } else { "ACTIVE" };
                Ok((status.to_string(), n))
            }
        })
        .await
        .unwrap();
        assert_eq!(entity, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_deletion() {
        let entity: Option<()> = wait_for("vol-1", &["deleting"], TargetStatus::Deleted, VOLUME, |id| async move {
            Err(OpenStackError::NotFound(id))
        })
        .await
        .unwrap();
        assert!(entity.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_error_status() {
        let err = wait_for("srv-1", &["BUILD"], TargetStatus::status("ACTIVE"), COMPUTE, |_id| async {
            Ok(("ERROR".to_string(), ()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_timeout() {
        let err = wait_for("fw-1", &["PENDING_CREATE"], TargetStatus::status("ACTIVE"), FIREWALL, |_id| async {
            Ok(("PENDING_CREATE".to_string(), ()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_passes_through() {
        let err = wait_for("rt-1", &["BUILD"], TargetStatus::status("ACTIVE"), ROUTER, |_id| async {
            Err::<(String, ()), _>(OpenStackError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::OpenStack(OpenStackError::Api { status: 500, .. })));
    }

    #[test]
    fn test_profiles() {
        assert_eq!(COMPUTE.timeout, Duration::from_secs(1800));
        assert_eq!(VOLUME.poll_interval, Duration::from_secs(2));
        assert_eq!(FIREWALL.initial_delay, Duration::ZERO);
    }
}
