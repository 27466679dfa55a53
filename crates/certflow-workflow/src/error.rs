//! Error types for certflow-workflow.

use certflow_access::AccessError;

use crate::deployer::DeployerError;

/// Result type alias using [`WorkflowError`].
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while running workflow nodes.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A stored record (output, certificate) does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Node or service configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A store could not be read.
    #[error("storage error: {0}")]
    Storage(String),

    /// The access record could not be resolved.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// No deployer is registered for this provider type.
    #[error("unknown deployer provider: {0}")]
    UnknownProvider(String),

    /// The deployer could not be constructed from the request.
    #[error("failed to create deployer: {0}")]
    DeployerInit(#[source] DeployerError),

    /// The deployer ran and failed.
    #[error("deployment failed: {0}")]
    Deploy(#[source] DeployerError),

    /// The deployment succeeded but its output could not be recorded.
    #[error("failed to record deployment output: {0}")]
    Persistence(String),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// The run was cancelled before it finished.
    #[error("run cancelled")]
    Cancelled,
}

impl WorkflowError {
    /// Create a record-not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::RecordNotFound(what.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether a missing record caused this error, including a missing
    /// access record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::RecordNotFound(_) => true,
            Self::Access(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether running the node again may succeed without changing its
    /// configuration.
    ///
    /// A persistence failure is retryable but the retry deploys again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Deploy(_) | Self::Persistence(_) | Self::Cancelled => true,
            Self::Access(e) => !e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WorkflowError::not_found("output for node n1");
        assert_eq!(err.to_string(), "record not found: output for node n1");

        let err = WorkflowError::configuration("bad certificate reference: abc");
        assert_eq!(
            err.to_string(),
            "configuration error: bad certificate reference: abc"
        );

        let err = WorkflowError::Deploy(DeployerError::Request("connection refused".to_owned()));
        assert_eq!(
            err.to_string(),
            "deployment failed: request failed: connection refused"
        );

        let err = WorkflowError::Access(AccessError::not_found("acc1"));
        assert_eq!(err.to_string(), "access error: access record not found: acc1");
    }

    #[test]
    fn not_found_includes_missing_access() {
        assert!(WorkflowError::not_found("x").is_not_found());
        assert!(WorkflowError::Access(AccessError::not_found("acc1")).is_not_found());
        assert!(!WorkflowError::Access(AccessError::Database("locked".to_owned())).is_not_found());
        assert!(!WorkflowError::Cancelled.is_not_found());
    }

    #[test]
    fn retryable_classification() {
        assert!(WorkflowError::storage("timeout").is_retryable());
        assert!(WorkflowError::Persistence("disk full".to_owned()).is_retryable());
        assert!(WorkflowError::Deploy(DeployerError::Request("reset".to_owned())).is_retryable());
        assert!(WorkflowError::Access(AccessError::Database("locked".to_owned())).is_retryable());

        assert!(!WorkflowError::configuration("abc").is_retryable());
        assert!(!WorkflowError::UnknownProvider("ftp".to_owned()).is_retryable());
        assert!(!WorkflowError::Access(AccessError::not_found("acc1")).is_retryable());
    }
}
