//! Configuration for certflow.

use std::path::{Path, PathBuf};

use certflow_access::AccessConfig;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{WorkflowError, WorkflowResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "certflow.toml";
/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "CERTFLOW_";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CertflowConfig {
    /// Output and certificate storage.
    #[serde(default)]
    pub store: StoreConfig,

    /// Access record storage.
    #[serde(default)]
    pub access: AccessConfig,

    /// Built-in deployer settings.
    #[serde(default)]
    pub deployer: DeployerSettings,
}

impl CertflowConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `certflow.toml` in the current directory (if present)
    /// 3. Environment variables with `CERTFLOW_` prefix
    pub fn load() -> WorkflowResult<Self> {
        Self::from_file(CONFIG_FILE)
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> WorkflowResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| WorkflowError::configuration(e.to_string()))
    }
}

/// Output store backend.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory store.
    #[default]
    Memory,

    /// SQLite store.
    Sqlite {
        /// Path to the SQLite database file.
        #[serde(default = "default_db_path")]
        db_path: PathBuf,
    },
}

fn default_db_path() -> PathBuf {
    PathBuf::from("certflow.db")
}

/// Settings shared by built-in deployers.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeployerSettings {
    /// Webhook deployer settings.
    #[serde(default)]
    pub webhook: WebhookSettings,
}

/// Webhook deployer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_webhook_timeout_secs() -> u64 {
    30
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}
