//! Access records for certflow deployers.
//!
//! An access record is a named, provider-specific credential blob (API keys,
//! webhook URLs, SSH settings) that a deployer needs to authenticate against
//! its target. This crate exposes a read-by-id [`AccessRepository`] with
//! pluggable backends.
//!
//! # Backends
//!
//! - **Memory** (`memory` feature): In-memory storage for tests and local runs
//! - **SQLite** (`sqlite` feature): Durable storage through `sqlx`
//!
//! # Missing records
//!
//! Every backend maps its own "no such row" condition to
//! [`AccessError::NotFound`], so callers can tell a missing credential apart
//! from an unavailable store:
//!
//! ```rust,ignore
//! match repository.get_by_id("acc1").await {
//!     Ok(access) => println!("using {}", access.name),
//!     Err(e) if e.is_not_found() => println!("credential was removed"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

mod error;
mod traits;
mod types;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "config")]
mod config;

#[cfg(feature = "config")]
mod provider;

pub use error::{AccessError, AccessResult};
pub use traits::AccessRepository;
pub use types::{AccessRecord, AccessUsage};

#[cfg(feature = "memory")]
pub use memory::MemoryAccess;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccess;

#[cfg(feature = "config")]
pub use config::AccessConfig;

#[cfg(feature = "config")]
pub use provider::AccessProvider;
