//! Resource State Reconciler
//!
//! Drives an asynchronously-mutated external resource to a desired observable
//! status by polling a caller-supplied status fetcher.
//!
//! Cloud APIs answer a boot, resize, attach or delete immediately with a
//! transitional status. The only completion signal is polling, so every
//! mutating operation hands control to [`wait_for_state`] with a
//! [`ReconciliationRequest`] describing:
//!
//! - the pending statuses (still in progress),
//! - the target status (or [`TargetStatus::Deleted`]),
//! - the timeout, initial delay and minimum poll interval.
//!
//! # Example
//!
//! ```no_run
//! use state_reconciler::{
//!     source_fn, FetchError, Observation, ReconciliationRequest, TargetStatus,
//! };
//! use std::time::Duration;
//!
//! # #[derive(Debug)] struct Server { status: String }
//! # #[derive(Debug, thiserror::Error)] #[error("boom")] struct ApiError;
//! # async fn get_server(_id: &str) -> Result<Option<Server>, ApiError> { unimplemented!() }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = ReconciliationRequest::builder("c0ffee", TargetStatus::status("ACTIVE"))
//!     .pending(["BUILD"])
//!     .timeout(Duration::from_secs(30 * 60))
//!     .initial_delay(Duration::from_secs(10))
//!     .poll_interval(Duration::from_secs(3))
//!     .build()?;
//!
//! let source = source_fn(|id: String| async move {
//!     match get_server(&id).await {
//!         Ok(Some(server)) => Ok(Observation::new(server.status.clone(), server)),
//!         Ok(None) => Err(FetchError::NotFound),
//!         Err(e) => Err(FetchError::Failed(e)),
//!     }
//! });
//!
//! let reconciled = request.wait(&source).await?;
//! println!("server is {}", reconciled.status());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod error;
pub mod request;
pub mod source;
pub mod waiter;

pub use backoff::PollBackoff;
pub use error::{InvalidRequest, ReconcileError};
pub use request::{ReconciliationRequest, ReconciliationRequestBuilder, TargetStatus};
pub use source::{FetchError, FnSource, Observation, StatusSource, source_fn};
pub use waiter::{Outcome, Reconciled, wait_for_state};
