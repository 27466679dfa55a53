//! Deployer that POSTs the certificate to an HTTP endpoint.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{DeployRequest, Deployer, DeployerError};
use crate::context::RunContext;
use crate::node::config_variables;
use crate::types::CertificateMaterial;

/// Access config of a webhook access record.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookAccess {
    /// Endpoint receiving the certificate.
    pub url: String,
}

/// JSON body sent to the webhook. Built per request so the key is only
/// exposed while serialising.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    domain: &'a str,
    certificate: String,
    private_key: &'a str,
    variables: &'a BTreeMap<String, String>,
}

/// Pushes the certificate to a webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookDeployer {
    client: Client,
    url: String,
    domain: String,
    material: CertificateMaterial,
    variables: BTreeMap<String, String>,
}

impl WebhookDeployer {
    /// Build a deployer from `request`, with a per-request `timeout`.
    pub fn new(request: DeployRequest, timeout: Duration) -> Result<Self, DeployerError> {
        let access: WebhookAccess = serde_json::from_str(request.access.expose_secret())
            .map_err(|e| DeployerError::InvalidAccess(format!("webhook access: {e}")))?;
        if access.url.trim().is_empty() {
            return Err(DeployerError::InvalidAccess(
                "webhook access has no url".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployerError::Request(e.to_string()))?;

        let variables = config_variables(&request.deploy_config.config)
            .into_iter()
            .collect();

        Ok(Self {
            client,
            url: access.url,
            domain: request.domain,
            material: request.certificate,
            variables,
        })
    }

    fn body(&self) -> WebhookBody<'_> {
        WebhookBody {
            domain: &self.domain,
            certificate: self.material.full_chain(),
            private_key: self.material.private_key.expose_secret(),
            variables: &self.variables,
        }
    }
}

#[async_trait]
impl Deployer for WebhookDeployer {
    #[instrument(skip(self, _ctx), fields(url = %self.url))]
    async fn deploy(&self, _ctx: &RunContext) -> Result<(), DeployerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.body())
            .send()
            .await
            .map_err(|e| DeployerError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(DeployerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "webhook accepted certificate");
        Ok(())
    }
}
