use thiserror::Error;

use crate::{
    application::context::Canceled, application::repos::RepoError, cache::CacheError,
    domain::error::DomainError, infra::error::InfraError,
};

/// Error surfaced by relation reads and writes.
///
/// Store and cache failures pass through unchanged in kind; nothing is
/// retried or swallowed on the way up.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("relation not found")]
    NotFound,
    #[error("relation already exists (constraint `{constraint}`)")]
    UniqueConstraintViolation { constraint: String },
    #[error("relation store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("relation cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("invalid relation input: {0}")]
    InvalidInput(String),
    #[error("operation canceled")]
    Canceled,
}

impl RelationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RelationError::NotFound)
    }
}

impl From<RepoError> for RelationError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => RelationError::NotFound,
            RepoError::Duplicate { constraint } => {
                RelationError::UniqueConstraintViolation { constraint }
            }
            RepoError::InvalidInput { message } => RelationError::InvalidInput(message),
            RepoError::Canceled => RelationError::Canceled,
            timeout @ RepoError::Timeout => RelationError::StoreUnavailable(timeout.to_string()),
            RepoError::Persistence(message) => RelationError::StoreUnavailable(message),
        }
    }
}

impl From<CacheError> for RelationError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Load(inner) => inner.into(),
            CacheError::Canceled => RelationError::Canceled,
            other @ (CacheError::Unavailable { .. } | CacheError::Codec { .. }) => {
                RelationError::CacheUnavailable(other.to_string())
            }
        }
    }
}

impl From<Canceled> for RelationError {
    fn from(_: Canceled) -> Self {
        RelationError::Canceled
    }
}

/// Top-level error of the `relcache` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Relation(#[from] RelationError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Relation(RelationError::NotFound) => 3,
            AppError::Relation(RelationError::UniqueConstraintViolation { .. }) => 4,
            AppError::Domain(_) | AppError::Relation(RelationError::InvalidInput(_)) => 2,
            AppError::Relation(RelationError::Canceled) => 124,
            AppError::Relation(_) | AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }
}
