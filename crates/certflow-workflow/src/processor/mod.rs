//! Node processors run one workflow node each.

mod deploy;

pub use deploy::DeployNode;

use std::sync::Arc;

use async_trait::async_trait;
use certflow_access::{AccessProvider, AccessRepository};
use tracing::info;

use crate::config::CertflowConfig;
use crate::context::RunContext;
use crate::deployer::DeployerRegistry;
use crate::error::{WorkflowError, WorkflowResult};
use crate::node::{NodeType, WorkflowNode};
use crate::progress::{ProgressSink, TracingProgress};
use crate::store::{open_stores, CertificateSource, OutputStore};
use crate::types::WorkflowOutput;

/// A workflow node the engine can run.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    /// Run the node within `ctx`.
    async fn run(&self, ctx: &RunContext) -> WorkflowResult<()>;
}

/// Result of a successful deploy node run.
#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// The certificate was deployed and the output recorded.
    Deployed(WorkflowOutput),
    /// A previous run already deployed this certificate.
    Skipped,
}

impl DeployOutcome {
    /// Whether the run did nothing.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Collaborators shared by node processors.
#[derive(Clone)]
pub struct NodeServices {
    /// Output storage.
    pub outputs: Arc<dyn OutputStore>,
    /// Issued certificates.
    pub certificates: Arc<dyn CertificateSource>,
    /// Access records.
    pub accesses: Arc<dyn AccessRepository>,
    /// Deployer constructors.
    pub deployers: Arc<DeployerRegistry>,
    /// Progress notes.
    pub progress: Arc<dyn ProgressSink>,
}

impl NodeServices {
    /// Bundle the given collaborators, logging progress through `tracing`.
    pub fn new(
        outputs: Arc<dyn OutputStore>,
        certificates: Arc<dyn CertificateSource>,
        accesses: Arc<dyn AccessRepository>,
        deployers: Arc<DeployerRegistry>,
    ) -> Self {
        Self {
            outputs,
            certificates,
            accesses,
            deployers,
            progress: Arc::new(TracingProgress),
        }
    }

    /// Build the services described by `config`, with the built-in deployers.
    pub async fn from_config(config: &CertflowConfig) -> WorkflowResult<Self> {
        let stores = open_stores(&config.store).await?;
        let accesses = AccessProvider::from_config(&config.access)
            .await?
            .repository()?;
        let deployers = DeployerRegistry::with_builtin(&config.deployer);
        info!(providers = ?deployers.provider_types(), "node services ready");

        Ok(Self::new(
            stores.outputs,
            stores.certificates,
            accesses,
            Arc::new(deployers),
        ))
    }

    /// Replace the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }
}

impl std::fmt::Debug for NodeServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeServices")
            .field("deployers", &self.deployers)
            .finish_non_exhaustive()
    }
}

/// Create the processor for `node`.
///
/// Only deploy nodes are handled here; other node types belong to the
/// issuance and notification subsystems.
pub fn processor_for(
    node: WorkflowNode,
    services: NodeServices,
) -> WorkflowResult<Box<dyn NodeProcessor>> {
    match node.node_type {
        NodeType::Deploy => Ok(Box::new(DeployNode::new(node, services))),
        other => Err(WorkflowError::configuration(format!(
            "no processor for {other} node {}",
            node.id
        ))),
    }
}
