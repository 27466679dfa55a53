//! Core types for certflow-workflow.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::node::WorkflowNode;

/// Separator between domains in a certificate's SAN list.
pub const SAN_SEPARATOR: char = ';';

/// An issued certificate as produced by a certificate-issuing node.
///
/// Certificates are immutable once issued. The deploy node only reads them.
/// The private key is never serialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Unique certificate identifier.
    pub id: String,
    /// Subject alternative names, `;`-separated.
    pub san: String,
    /// Leaf certificate PEM.
    pub certificate: String,
    /// Private key PEM.
    #[serde(skip_serializing)]
    pub private_key: SecretString,
    /// Issuer (intermediate) certificate PEM.
    #[serde(default)]
    pub issuer_certificate: String,
    /// ACME certificate URL.
    #[serde(default)]
    pub cert_url: String,
    /// ACME stable certificate URL.
    #[serde(default)]
    pub cert_stable_url: String,
    /// Workflow that issued the certificate.
    #[serde(default)]
    pub workflow_id: String,
    /// Node that issued the certificate.
    #[serde(default)]
    pub workflow_node_id: String,
    /// Output record the certificate was saved with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
    /// When the certificate was issued.
    pub created: DateTime<Utc>,
    /// When the certificate record was last touched.
    pub updated: DateTime<Utc>,
}

impl Certificate {
    /// Create a certificate issued now.
    #[must_use]
    pub fn new(
        san: impl Into<String>,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            san: san.into(),
            certificate: certificate.into(),
            private_key: SecretString::from(private_key.into()),
            issuer_certificate: String::new(),
            cert_url: String::new(),
            cert_stable_url: String::new(),
            workflow_id: String::new(),
            workflow_node_id: String::new(),
            output_id: None,
            created: now,
            updated: now,
        }
    }

    /// Set the issuer certificate.
    #[must_use]
    pub fn with_issuer(mut self, issuer_certificate: impl Into<String>) -> Self {
        self.issuer_certificate = issuer_certificate.into();
        self
    }

    /// Set the ACME certificate URLs.
    #[must_use]
    pub fn with_urls(mut self, cert_url: impl Into<String>, cert_stable_url: impl Into<String>) -> Self {
        self.cert_url = cert_url.into();
        self.cert_stable_url = cert_stable_url.into();
        self
    }

    /// Override the issue time.
    #[must_use]
    pub const fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self.updated = created;
        self
    }

    /// The domains covered by this certificate.
    #[must_use]
    pub fn domains(&self) -> Vec<&str> {
        self.san
            .split(SAN_SEPARATOR)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// The material a deployer needs to install this certificate.
    #[must_use]
    pub fn material(&self) -> CertificateMaterial {
        CertificateMaterial {
            cert_url: self.cert_url.clone(),
            cert_stable_url: self.cert_stable_url.clone(),
            private_key: self.private_key.clone(),
            certificate: self.certificate.clone(),
            issuer_certificate: self.issuer_certificate.clone(),
        }
    }
}

/// Certificate PEMs and ACME URLs handed to a deployer.
#[derive(Debug, Clone)]
pub struct CertificateMaterial {
    /// ACME certificate URL.
    pub cert_url: String,
    /// ACME stable certificate URL.
    pub cert_stable_url: String,
    /// Private key PEM.
    pub private_key: SecretString,
    /// Leaf certificate PEM.
    pub certificate: String,
    /// Issuer (intermediate) certificate PEM.
    pub issuer_certificate: String,
}

impl CertificateMaterial {
    /// Material for a leaf certificate and its key, without issuer or URLs.
    #[must_use]
    pub fn new(certificate: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            cert_url: String::new(),
            cert_stable_url: String::new(),
            private_key: SecretString::from(private_key.into()),
            certificate: certificate.into(),
            issuer_certificate: String::new(),
        }
    }

    /// Set the issuer certificate.
    #[must_use]
    pub fn with_issuer(mut self, issuer_certificate: impl Into<String>) -> Self {
        self.issuer_certificate = issuer_certificate.into();
        self
    }

    /// Leaf certificate followed by the issuer, when there is one.
    #[must_use]
    pub fn full_chain(&self) -> String {
        if self.issuer_certificate.is_empty() {
            return self.certificate.clone();
        }
        let mut chain = self.certificate.trim_end().to_owned();
        chain.push('\n');
        chain.push_str(&self.issuer_certificate);
        chain
    }
}

/// The persisted outcome of a node's last execution.
///
/// There is at most one logical output per (workflow, node). Stores update it
/// in place on re-runs, keeping `id` and `created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutput {
    /// Record id, `None` until the output is first saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workflow the node belongs to.
    pub workflow: String,
    /// Node the output belongs to.
    pub node_id: String,
    /// Snapshot of the node at the time of recording.
    pub node: WorkflowNode,
    /// Whether the node succeeded.
    pub succeed: bool,
    /// When the output was first recorded.
    pub created: DateTime<Utc>,
    /// When the output was last recorded.
    pub updated: DateTime<Utc>,
}

impl WorkflowOutput {
    /// Create an unsaved output for `node`.
    #[must_use]
    pub fn new(workflow: impl Into<String>, node: WorkflowNode, succeed: bool) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            workflow: workflow.into(),
            node_id: node.id.clone(),
            node,
            succeed,
            created: now,
            updated: now,
        }
    }

    /// Reuse an existing record id.
    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }
}
