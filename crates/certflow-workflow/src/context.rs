//! Per-run context handed to nodes and deployers.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{WorkflowError, WorkflowResult};

/// Context for one execution of a workflow.
///
/// Carries the workflow id and a cancellation token. Every collaborator call
/// a node makes goes through [`RunContext::run`], so a cancelled run stops at
/// the next await point instead of issuing further I/O.
#[derive(Debug, Clone)]
pub struct RunContext {
    workflow_id: String,
    cancel: CancellationToken,
}

impl RunContext {
    /// Create a context for `workflow_id` with a fresh cancellation token.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The workflow being executed.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// The token that cancels this run.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the run has been cancelled.
    pub fn check_cancelled(&self) -> WorkflowResult<()> {
        if self.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the run is cancelled first.
    pub async fn run<F, T>(&self, fut: F) -> WorkflowResult<T>
    where
        F: Future<Output = WorkflowResult<T>>,
    {
        self.check_cancelled()?;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(WorkflowError::Cancelled),
            result = fut => result,
        }
    }
}
