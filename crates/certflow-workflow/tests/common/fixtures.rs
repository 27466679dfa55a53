//! Test fixtures for deploy node integration tests.

use certflow_access::AccessRecord;
use certflow_workflow::node::{CONFIG_ACCESS, CONFIG_CERTIFICATE, CONFIG_PROVIDER_TYPE};
use certflow_workflow::{Certificate, NodeType, WorkflowNode, WorkflowOutput};
use chrono::{DateTime, Duration, Utc};

/// Builder for deploy nodes.
pub struct DeployNodeBuilder {
    node: WorkflowNode,
}

impl DeployNodeBuilder {
    /// A deploy node `deploy1` wired to `apply1`, `acc1` and the counting deployer.
    pub fn new() -> Self {
        let node = WorkflowNode::new("deploy1", "Deploy to CDN", NodeType::Deploy)
            .with_config(CONFIG_CERTIFICATE, "apply1#certificate")
            .with_config(CONFIG_ACCESS, "acc1")
            .with_config(CONFIG_PROVIDER_TYPE, super::COUNTING_PROVIDER);
        Self { node }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.node.id = id.to_owned();
        self
    }

    pub fn with_certificate_ref(mut self, reference: &str) -> Self {
        self.node = self.node.with_config(CONFIG_CERTIFICATE, reference);
        self
    }

    pub fn with_access(mut self, access: &str) -> Self {
        self.node = self.node.with_config(CONFIG_ACCESS, access);
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.node = self.node.with_config(CONFIG_PROVIDER_TYPE, provider);
        self
    }

    pub fn build(self) -> WorkflowNode {
        self.node
    }
}

/// A certificate issued by `node_id` at `created`.
pub fn certificate(node_id: &str, created: DateTime<Utc>) -> Certificate {
    let mut cert = Certificate::new("example.com;www.example.com", "LEAF\n", "KEY")
        .with_issuer("ISSUER\n")
        .with_created(created);
    cert.workflow_node_id = node_id.to_owned();
    cert
}

/// An output for `node` last updated at `updated`.
pub fn output(workflow: &str, node: &WorkflowNode, succeed: bool, updated: DateTime<Utc>) -> WorkflowOutput {
    let mut output = WorkflowOutput::new(workflow, node.clone(), succeed);
    output.created = updated - Duration::days(1);
    output.updated = updated;
    output
}

/// The `acc1` access record.
pub fn access() -> AccessRecord {
    AccessRecord::new("CDN key", super::COUNTING_PROVIDER, r#"{"apiKey":"secret"}"#).with_id("acc1")
}

/// `hours` hours ago.
pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}
