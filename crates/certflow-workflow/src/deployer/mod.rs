//! Deployers push an issued certificate to a target system.
//!
//! Each provider type maps to a constructor in a [`DeployerRegistry`]. The
//! constructor receives a [`DeployRequest`] with everything the deployer
//! needs and returns a ready-to-run [`Deployer`].

mod local;
mod registry;
mod webhook;

pub use local::{LocalDeployer, CONFIG_CERT_PATH, CONFIG_ISSUER_PATH, CONFIG_KEY_PATH};
pub use registry::{DeployerFactory, DeployerRegistry};
pub use webhook::{WebhookAccess, WebhookDeployer};

use async_trait::async_trait;
use certflow_access::AccessRecord;
use secrecy::SecretString;
use serde_json::Value;

use crate::context::RunContext;
use crate::node::NodeConfig;
use crate::types::CertificateMaterial;

/// Provider type of the built-in webhook deployer.
pub const PROVIDER_WEBHOOK: &str = "webhook";
/// Provider type of the built-in local filesystem deployer.
pub const PROVIDER_LOCAL: &str = "local";

/// Errors raised by deployers.
#[derive(Debug, thiserror::Error)]
pub enum DeployerError {
    /// The access record's config is unusable for this provider.
    #[error("invalid access config: {0}")]
    InvalidAccess(String),

    /// The node's config is unusable for this provider.
    #[error("invalid deploy config: {0}")]
    InvalidConfig(String),

    /// The target could not be reached.
    #[error("request failed: {0}")]
    Request(String),

    /// The target answered with an error.
    #[error("target rejected deployment with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Local I/O failed.
    #[error("io error: {0}")]
    Io(String),
}

/// A deployer bound to one request.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Push the certificate to the target.
    async fn deploy(&self, ctx: &RunContext) -> Result<(), DeployerError>;
}

/// The deploy node's own settings forwarded to the deployer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    /// Deploy node id.
    pub id: String,
    /// Access record id.
    pub access: String,
    /// Selected provider type.
    pub provider_type: String,
    /// Raw node configuration.
    pub config: NodeConfig,
}

impl DeployConfig {
    /// A string value from the node configuration, if present.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// Everything a deployer constructor receives.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Domain identifier, the deploy node id.
    pub domain_id: String,
    /// The certificate's SAN list.
    pub domain: String,
    /// Raw access config blob.
    pub access: SecretString,
    /// Full access record.
    pub access_record: AccessRecord,
    /// Certificate material to install.
    pub certificate: CertificateMaterial,
    /// The deploy node's settings.
    pub deploy_config: DeployConfig,
}
