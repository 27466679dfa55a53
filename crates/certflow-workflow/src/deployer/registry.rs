//! Provider-type to constructor map.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{
    DeployRequest, Deployer, DeployerError, LocalDeployer, WebhookDeployer, PROVIDER_LOCAL,
    PROVIDER_WEBHOOK,
};
use crate::config::DeployerSettings;
use crate::error::{WorkflowError, WorkflowResult};

/// Builds a deployer from a request.
pub type DeployerFactory =
    Arc<dyn Fn(DeployRequest) -> Result<Box<dyn Deployer>, DeployerError> + Send + Sync>;

/// Registry of deployer constructors keyed by provider type.
#[derive(Clone, Default)]
pub struct DeployerRegistry {
    factories: BTreeMap<String, DeployerFactory>,
}

impl DeployerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in providers.
    #[must_use]
    pub fn with_builtin(settings: &DeployerSettings) -> Self {
        let timeout = Duration::from_secs(settings.webhook.timeout_secs);
        let mut registry = Self::new();
        registry.register(PROVIDER_WEBHOOK, move |request| {
            WebhookDeployer::new(request, timeout).map(|d| Box::new(d) as Box<dyn Deployer>)
        });
        registry.register(PROVIDER_LOCAL, |request| {
            LocalDeployer::new(request).map(|d| Box::new(d) as Box<dyn Deployer>)
        });
        registry
    }

    /// Register a constructor, replacing any previous one for the type.
    pub fn register<F>(&mut self, provider_type: impl Into<String>, factory: F)
    where
        F: Fn(DeployRequest) -> Result<Box<dyn Deployer>, DeployerError> + Send + Sync + 'static,
    {
        let provider_type = provider_type.into();
        debug!(provider_type = %provider_type, "registering deployer");
        self.factories.insert(provider_type, Arc::new(factory));
    }

    /// Whether a constructor is registered for the type.
    #[must_use]
    pub fn contains(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registered provider types in sorted order.
    #[must_use]
    pub fn provider_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the deployer for `provider_type` from `request`.
    pub fn get_with_type_and_option(
        &self,
        provider_type: &str,
        request: DeployRequest,
    ) -> WorkflowResult<Box<dyn Deployer>> {
        let factory = self
            .factories
            .get(provider_type)
            .ok_or_else(|| WorkflowError::UnknownProvider(provider_type.to_owned()))?;
        factory(request).map_err(WorkflowError::DeployerInit)
    }
}

impl std::fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerRegistry")
            .field("provider_types", &self.provider_types())
            .finish()
    }
}
