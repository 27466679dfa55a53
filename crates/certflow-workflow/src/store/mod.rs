//! Output and certificate storage backends.
//!
//! The deploy node reads the last output of a node to decide whether it has
//! to deploy again, and reads the certificate produced by an issuing node.
//! Both backends implement [`OutputStore`] and [`CertificateSource`].

mod memory;
mod sqlite;

pub use memory::MemoryOutputStore;
pub use sqlite::SqliteOutputStore;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::WorkflowResult;
use crate::types::{Certificate, WorkflowOutput};

/// Storage for node outputs.
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// The most recently updated output of `node_id`.
    ///
    /// Fails with [`WorkflowError::RecordNotFound`](crate::WorkflowError::RecordNotFound)
    /// when the node has never recorded one.
    async fn get(&self, node_id: &str) -> WorkflowResult<WorkflowOutput>;

    /// Insert or update the output keyed by `(workflow, node_id)`.
    ///
    /// An existing record keeps its `id` and `created`; `updated` is stamped
    /// with the current time. When `certificate` is given it is stored linked
    /// to the saved output.
    async fn save(
        &self,
        output: &WorkflowOutput,
        certificate: Option<&Certificate>,
    ) -> WorkflowResult<WorkflowOutput>;
}

/// Read access to issued certificates.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// The most recently created certificate issued by `node_id`.
    async fn get_certificate(&self, node_id: &str) -> WorkflowResult<Certificate>;
}

/// A backend serving both outputs and certificates.
#[derive(Clone)]
pub struct Stores {
    /// Output storage.
    pub outputs: Arc<dyn OutputStore>,
    /// Certificate storage.
    pub certificates: Arc<dyn CertificateSource>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the configured store backend.
pub async fn open_stores(config: &StoreConfig) -> WorkflowResult<Stores> {
    match config {
        StoreConfig::Memory => {
            info!("using in-memory output store");
            let store = Arc::new(MemoryOutputStore::new());
            Ok(Stores {
                outputs: store.clone(),
                certificates: store,
            })
        }
        StoreConfig::Sqlite { db_path } => {
            info!(path = %db_path.display(), "using sqlite output store");
            let store = Arc::new(SqliteOutputStore::open(db_path).await?);
            Ok(Stores {
                outputs: store.clone(),
                certificates: store,
            })
        }
    }
}
