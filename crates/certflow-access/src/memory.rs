//! In-memory access backend for testing and development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AccessError, AccessResult};
use crate::traits::AccessRepository;
use crate::types::AccessRecord;

/// In-memory access backend.
///
/// Records are not persisted across restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccess {
    data: Arc<RwLock<HashMap<String, AccessRecord>>>,
}

impl MemoryAccess {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record, replacing any record with the same id.
    pub async fn insert(&self, record: AccessRecord) {
        let mut data = self.data.write().await;
        data.insert(record.id.clone(), record);
    }

    /// Removes a record. Returns `true` if it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut data = self.data.write().await;
        data.remove(id).is_some()
    }
}

#[async_trait]
impl AccessRepository for MemoryAccess {
    async fn get_by_id(&self, id: &str) -> AccessResult<AccessRecord> {
        let data = self.data.read().await;
        data.get(id).cloned().ok_or_else(|| AccessError::not_found(id))
    }
}
