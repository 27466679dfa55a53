//! Deployer that writes PEM files on the local host.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use super::{DeployRequest, Deployer, DeployerError};
use crate::context::RunContext;
use crate::types::CertificateMaterial;

/// Node config key for the certificate chain path.
pub const CONFIG_CERT_PATH: &str = "certPath";
/// Node config key for the private key path.
pub const CONFIG_KEY_PATH: &str = "keyPath";
/// Node config key for the optional issuer certificate path.
pub const CONFIG_ISSUER_PATH: &str = "issuerPath";

/// Writes the certificate chain, key and issuer to files.
#[derive(Debug, Clone)]
pub struct LocalDeployer {
    cert_path: PathBuf,
    key_path: PathBuf,
    issuer_path: Option<PathBuf>,
    material: CertificateMaterial,
}

impl LocalDeployer {
    /// Build a deployer from `request`. Both `certPath` and `keyPath` are
    /// required.
    pub fn new(request: DeployRequest) -> Result<Self, DeployerError> {
        let config = &request.deploy_config;
        let required = |key: &str| {
            config
                .get_str(key)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| DeployerError::InvalidConfig(format!("missing {key}")))
        };

        let cert_path = required(CONFIG_CERT_PATH)?;
        let key_path = required(CONFIG_KEY_PATH)?;
        let issuer_path = config
            .get_str(CONFIG_ISSUER_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            cert_path,
            key_path,
            issuer_path,
            material: request.certificate,
        })
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), DeployerError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DeployerError::Io(format!("create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DeployerError::Io(format!("write {}: {e}", path.display())))?;
    debug!(path = %path.display(), "wrote file");
    Ok(())
}

#[async_trait]
impl Deployer for LocalDeployer {
    #[instrument(skip(self, _ctx), fields(cert_path = %self.cert_path.display()))]
    async fn deploy(&self, _ctx: &RunContext) -> Result<(), DeployerError> {
        write_file(&self.cert_path, &self.material.full_chain()).await?;
        write_file(&self.key_path, self.material.private_key.expose_secret()).await?;
        if let Some(issuer_path) = &self.issuer_path {
            write_file(issuer_path, &self.material.issuer_certificate).await?;
        }
        Ok(())
    }
}
