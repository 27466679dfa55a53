//! Configuration types for access backends.

use std::path::PathBuf;

use serde::Deserialize;

/// Backend configuration variants.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum AccessConfig {
    /// In-memory backend.
    #[default]
    Memory,

    /// SQLite backend.
    #[cfg(feature = "sqlite")]
    Sqlite {
        /// Path to the SQLite database file.
        #[serde(default = "default_db_path")]
        db_path: PathBuf,
    },
}

#[cfg(feature = "sqlite")]
fn default_db_path() -> PathBuf {
    PathBuf::from("certflow.db")
}
