//! The "fetch current status" capability the reconciler polls.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// One status observation of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    /// Status string as reported by the backend
    pub status: String,
    /// Raw entity returned alongside the status
    pub entity: T,
}

impl<T> Observation<T> {
    /// Pair a status with its entity.
    pub fn new(status: impl Into<String>, entity: T) -> Self {
        Self {
            status: status.into(),
            entity,
        }
    }
}

/// Classified fetch failure.
///
/// Callers map their transport errors into these two kinds; HTTP 404 is
/// [`FetchError::NotFound`], anything else is [`FetchError::Failed`].
#[derive(Debug)]
pub enum FetchError<E> {
    /// The entity does not exist
    NotFound,
    /// Network, auth, decoding or any other failure
    Failed(E),
}

/// Supplies the current status of an entity by id.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Entity type returned with each status
    type Entity: fmt::Debug + Send;
    /// Error type for non-404 failures
    type Error: std::error::Error + Send + 'static;

    /// Fetch the current status of `entity_id`.
    async fn fetch_status(
        &self,
        entity_id: &str,
    ) -> Result<Observation<Self::Entity>, FetchError<Self::Error>>;
}

/// [`StatusSource`] backed by an async closure. See [`source_fn`].
pub struct FnSource<F> {
    f: F,
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").finish_non_exhaustive()
    }
}

/// Wrap an async closure taking the entity id as a [`StatusSource`].
pub fn source_fn<F, Fut, T, E>(f: F) -> FnSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>, FetchError<E>>> + Send,
    T: fmt::Debug + Send,
    E: std::error::Error + Send + 'static,
{
    FnSource { f }
}

#[async_trait]
impl<F, Fut, T, E> StatusSource for FnSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>, FetchError<E>>> + Send,
    T: fmt::Debug + Send,
    E: std::error::Error + Send + 'static,
{
    type Entity = T;
    type Error = E;

    async fn fetch_status(&self, entity_id: &str) -> Result<Observation<T>, FetchError<E>> {
        (self.f)(entity_id.to_string()).await
    }
}
