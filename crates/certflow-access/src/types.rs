//! Core types for access records.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// What an access record may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessUsage {
    /// Certificate issuance only (DNS challenge providers).
    Apply,
    /// Certificate deployment only.
    Deploy,
    /// Both issuance and deployment.
    #[default]
    All,
}

impl AccessUsage {
    /// Get the usage tag as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Deploy => "deploy",
            Self::All => "all",
        }
    }
}

impl fmt::Display for AccessUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessUsage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Self::Apply),
            "deploy" => Ok(Self::Deploy),
            "all" | "" => Ok(Self::All),
            _ => Err(format!("unknown access usage: {s}")),
        }
    }
}

/// A named, provider-specific credential record.
///
/// `config` is an opaque JSON blob whose shape depends on `config_type`
/// (for example `{"url": "..."}` for a webhook). It is held as a
/// [`SecretString`]: redacted in `Debug` and left out when serialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    /// Unique record identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Provider-specific configuration blob.
    #[serde(skip_serializing)]
    pub config: SecretString,
    /// Provider type the configuration belongs to (`webhook`, `aliyun`, ...).
    pub config_type: String,
    /// What the record may be used for.
    #[serde(default)]
    pub usage: AccessUsage,
    /// When the record was created.
    pub created: DateTime<Utc>,
    /// When the record was last updated.
    pub updated: DateTime<Utc>,
}

impl AccessRecord {
    /// Create a new record with a generated id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config_type: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            name: name.into(),
            config: SecretString::from(config.into()),
            config_type: config_type.into(),
            usage: AccessUsage::default(),
            created: now,
            updated: now,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the usage tag.
    #[must_use]
    pub const fn with_usage(mut self, usage: AccessUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Decode the configuration blob into a provider-specific type.
    pub fn parse_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.config.expose_secret())
    }
}
