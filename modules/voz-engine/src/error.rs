//! Typed errors for engine operations.

use thiserror::Error;
use voz_common::GeoError;
use voz_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed input. Raised before any store mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced resource does not exist. Carries only the resource kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Write rejected because it would duplicate an existing record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor lacks ownership or jurisdictional authority.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<GeoError> for EngineError {
    fn from(err: GeoError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
