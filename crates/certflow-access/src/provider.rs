//! Provider factory for access backends.

use std::sync::Arc;

use crate::config::AccessConfig;
use crate::error::{AccessError, AccessResult};
use crate::traits::AccessRepository;

#[cfg(feature = "memory")]
use crate::memory::MemoryAccess;

#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteAccess;

/// Provider for access backends.
///
/// Builds a repository from configuration, or holds one injected by the
/// caller.
#[derive(Clone, Default)]
#[must_use]
pub struct AccessProvider {
    repository: Option<Arc<dyn AccessRepository>>,
}

impl AccessProvider {
    /// Creates a new empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider from configuration.
    pub async fn from_config(config: &AccessConfig) -> AccessResult<Self> {
        let repository = Self::create_repository(config).await?;
        Ok(Self {
            repository: Some(repository),
        })
    }

    /// Sets the repository for this provider.
    pub fn with_repository(mut self, repository: Arc<dyn AccessRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Returns the configured repository.
    pub fn repository(&self) -> AccessResult<Arc<dyn AccessRepository>> {
        self.repository.clone().ok_or(AccessError::NotConfigured)
    }

    async fn create_repository(config: &AccessConfig) -> AccessResult<Arc<dyn AccessRepository>> {
        match config {
            #[cfg(feature = "memory")]
            AccessConfig::Memory => Ok(Arc::new(MemoryAccess::new())),

            #[cfg(feature = "sqlite")]
            AccessConfig::Sqlite { db_path } => Ok(Arc::new(SqliteAccess::open(db_path).await?)),

            #[allow(unreachable_patterns)]
            _ => Err(AccessError::UnsupportedBackend(
                "no suitable access backend enabled".to_owned(),
            )),
        }
    }
}

impl std::fmt::Debug for AccessProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessProvider")
            .field("repository", &self.repository.is_some())
            .finish()
    }
}
