//! Error types for the object pool

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Error type returned by user-supplied lifecycle callbacks
pub type CallbackError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Pool is exhausted - maximum size reached and no objects available")]
    Exhausted,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Failed to create pooled object: {0}")]
    CreateFailed(#[source] Arc<dyn StdError + Send + Sync>),

    #[error("Size {requested} is outside the allowed range {min}..={max}")]
    InvalidRange {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Pool must be created inside a tokio runtime")]
    NoRuntime,

    #[error("No pool registered for {0}")]
    PoolNotFound(String),

    #[error("A pool is already registered for {0}")]
    AlreadyRegistered(String),

    #[error("Pool registered for {0} holds a different object type")]
    TypeMismatch(String),
}

impl PoolError {
    pub(crate) fn create_failed(err: CallbackError) -> Self {
        PoolError::CreateFailed(Arc::from(err))
    }

    /// Whether the caller may reasonably retry the operation later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PoolError::Exhausted | PoolError::CreateFailed(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_failed_keeps_source() {
        let err = PoolError::create_failed("connection refused".into());

        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PoolError::Exhausted.is_recoverable());
        assert!(!PoolError::Closed.is_recoverable());
        assert!(!PoolError::InvalidConfig("x".into()).is_recoverable());
    }
}
