//! Error types for canvas item configuration.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur while interpreting canvas items.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Item configuration is out of its valid domain.
    ///
    /// Geometry code degrades to an identity result instead of returning this;
    /// it is surfaced by the validation helpers for diagnostics.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Border radius string could not be parsed.
    #[error("Invalid border radius: {0}")]
    InvalidBorderRadius(String),

    /// Item document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
