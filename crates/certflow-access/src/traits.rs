//! Traits for access backend implementations.

use async_trait::async_trait;

use crate::error::AccessResult;
use crate::types::AccessRecord;

/// Read side of the access-credential storage.
///
/// Implementations must report a missing record as
/// [`AccessError::NotFound`](crate::AccessError::NotFound) and reserve the
/// other variants for genuine storage failures.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Retrieves an access record by id.
    async fn get_by_id(&self, id: &str) -> AccessResult<AccessRecord>;
}
