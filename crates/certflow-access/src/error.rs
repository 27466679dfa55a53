//! Error types for access record lookups.

use thiserror::Error;

/// Result type alias using [`AccessError`].
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors that can occur while resolving access records.
#[derive(Debug, Error)]
pub enum AccessError {
    /// No access record exists with this id.
    #[error("access record not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// Backend not configured.
    #[error("access backend not configured")]
    NotConfigured,

    /// Unsupported backend type.
    #[error("unsupported access backend: {0}")]
    UnsupportedBackend(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

impl AccessError {
    /// Create a not-found error for `id`.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Whether the record is missing, as opposed to the store failing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
