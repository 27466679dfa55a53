//! Deploy node: pushes an issued certificate at most once per version.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{DeployOutcome, NodeProcessor, NodeServices};
use crate::context::RunContext;
use crate::deployer::{DeployConfig, DeployRequest};
use crate::error::{WorkflowError, WorkflowResult};
use crate::node::{
    CertificateRef, WorkflowNode, CONFIG_ACCESS, CONFIG_CERTIFICATE, CONFIG_PROVIDER_TYPE,
};
use crate::types::{Certificate, WorkflowOutput};

/// Runs a deploy node.
///
/// A run deploys when the node has never succeeded, or when the referenced
/// certificate was created at or after the last successful output. Otherwise
/// it returns [`DeployOutcome::Skipped`] without touching the deployer or the
/// output store.
///
/// Two concurrent runs of the same node can both deploy. The store still
/// keeps a single output for the node.
#[derive(Debug, Clone)]
pub struct DeployNode {
    node: WorkflowNode,
    services: NodeServices,
}

impl DeployNode {
    /// Create a deploy node runner.
    pub fn new(node: WorkflowNode, services: NodeServices) -> Self {
        Self { node, services }
    }

    /// The node being run.
    pub fn node(&self) -> &WorkflowNode {
        &self.node
    }

    fn note(&self, ctx: &RunContext, message: &str, detail: Option<&str>) {
        self.services
            .progress
            .add_output(ctx, &self.node.name, message, detail);
    }

    fn fail(&self, ctx: &RunContext, message: &str, error: WorkflowError) -> WorkflowError {
        warn!(node_id = %self.node.id, error = %error, "{message}");
        self.note(ctx, message, Some(&error.to_string()));
        error
    }

    /// Run the node and report whether it deployed.
    #[instrument(skip(self, ctx), fields(workflow_id = %ctx.workflow_id(), node_id = %self.node.id))]
    pub async fn execute(&self, ctx: &RunContext) -> WorkflowResult<DeployOutcome> {
        ctx.check_cancelled()?;
        self.note(ctx, "started", None);

        let prior = match ctx.run(self.services.outputs.get(&self.node.id)).await {
            Ok(output) => Some(output),
            Err(WorkflowError::RecordNotFound(_)) => None,
            Err(e) => return Err(self.fail(ctx, "failed to query deployment record", e)),
        };

        let reference = CertificateRef::parse(&self.node.get_config_string(CONFIG_CERTIFICATE))
            .map_err(|e| self.fail(ctx, "invalid certificate source", e))?;

        let certificate = ctx
            .run(self.services.certificates.get_certificate(&reference.node_id))
            .await
            .map_err(|e| self.fail(ctx, "failed to get certificate", e))?;

        if let Some(prior) = &prior {
            if prior.succeed && certificate.created < prior.updated {
                info!(
                    certificate_id = %certificate.id,
                    output_id = ?prior.id,
                    "certificate already deployed"
                );
                self.note(ctx, "already deployed and certificate unchanged", None);
                return Ok(DeployOutcome::Skipped);
            }
        }

        let access_id = self.node.get_config_string(CONFIG_ACCESS);
        let access = ctx
            .run(async {
                self.services
                    .accesses
                    .get_by_id(&access_id)
                    .await
                    .map_err(WorkflowError::from)
            })
            .await
            .map_err(|e| self.fail(ctx, "failed to get access config", e))?;

        let provider_type = self.node.get_config_string(CONFIG_PROVIDER_TYPE);
        let request = self.request(&certificate, access, &provider_type);
        let deployer = self
            .services
            .deployers
            .get_with_type_and_option(&provider_type, request)
            .map_err(|e| self.fail(ctx, "failed to create deployer", e))?;

        debug!(provider_type = %provider_type, "invoking deployer");
        ctx.run(async { deployer.deploy(ctx).await.map_err(WorkflowError::Deploy) })
            .await
            .map_err(|e| self.fail(ctx, "deployment failed", e))?;

        info!(provider_type = %provider_type, certificate_id = %certificate.id, "certificate deployed");
        self.note(ctx, "deployed", None);

        // The deployment is not rolled back when recording it fails; the next
        // run will deploy again.
        let output = WorkflowOutput::new(ctx.workflow_id(), self.node.clone(), true)
            .with_id(
                prior
                    .filter(|p| p.workflow == ctx.workflow_id())
                    .and_then(|p| p.id),
            );
        let saved = ctx
            .run(self.services.outputs.save(&output, None))
            .await
            .map_err(|e| {
                let e = match e {
                    WorkflowError::Persistence(_) | WorkflowError::Cancelled => e,
                    other => WorkflowError::Persistence(other.to_string()),
                };
                self.fail(ctx, "failed to save deployment record", e)
            })?;

        self.note(ctx, "saved deployment record", None);
        Ok(DeployOutcome::Deployed(saved))
    }

    fn request(
        &self,
        certificate: &Certificate,
        access: certflow_access::AccessRecord,
        provider_type: &str,
    ) -> DeployRequest {
        DeployRequest {
            domain_id: self.node.id.clone(),
            domain: certificate.san.clone(),
            access: access.config.clone(),
            certificate: certificate.material(),
            deploy_config: DeployConfig {
                id: self.node.id.clone(),
                access: access.id.clone(),
                provider_type: provider_type.to_owned(),
                config: self.node.config.clone(),
            },
            access_record: access,
        }
    }
}

#[async_trait]
impl NodeProcessor for DeployNode {
    async fn run(&self, ctx: &RunContext) -> WorkflowResult<()> {
        self.execute(ctx).await.map(|_| ())
    }
}
