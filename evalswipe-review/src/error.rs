//! Error types for the review engine
//!
//! Every failed command surfaces one of these; none of them leave the engine
//! unusable.

use thiserror::Error;

pub use crate::backend::BackendError;
pub use crate::store::StorageError;

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// Bad reviewer input; nothing was mutated or persisted
    #[error("{0}")]
    Validation(String),

    /// Backend call failed; local state is unchanged and the command can be re-issued
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Navigation out of range or no current trace
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Command needs a loaded session
    #[error("No active session")]
    NoSession,
}

impl ReviewError {
    /// Short category name for logs and toasts
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewError::Validation(_) => "validation",
            ReviewError::Backend(_) => "backend",
            ReviewError::NotFound(_) => "not_found",
            ReviewError::Storage(_) => "storage",
            ReviewError::NoSession => "no_session",
        }
    }
}
