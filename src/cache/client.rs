//! Cache client contract used by the relation views.
//!
//! A client owns the actual key/value backend. It is long-lived and shared by
//! every cache façade and accumulator built on top of it.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::application::context::Canceled;
use crate::application::repos::RepoError;

/// Backing-store load run by a client on a miss.
pub type Loader<'a> = BoxFuture<'a, Result<Vec<String>, RepoError>>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("cached value for `{key}` could not be decoded: {message}")]
    Codec { key: String, message: String },
    #[error(transparent)]
    Load(#[from] RepoError),
    #[error("operation canceled")]
    Canceled,
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }
}

impl From<Canceled> for CacheError {
    fn from(_: Canceled) -> Self {
        CacheError::Canceled
    }
}

#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Return the value under `key`, running `loader` and storing its result
    /// for `ttl` when absent or expired.
    ///
    /// Implementations run at most one loader per key at a time within their
    /// deduplication domain. A failed load stores nothing and is returned as
    /// [`CacheError::Load`].
    async fn get_or_load(
        &self,
        key: &str,
        ttl: Duration,
        loader: Loader<'_>,
    ) -> Result<Vec<String>, CacheError>;

    /// Remove every key in one round trip. Missing keys are not an error.
    async fn batch_delete(&self, keys: &[String]) -> Result<(), CacheError>;
}
