//! In-memory output store for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{WorkflowError, WorkflowResult};
use crate::types::{Certificate, WorkflowOutput};

use super::{CertificateSource, OutputStore};

/// In-memory output and certificate store.
///
/// Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryOutputStore {
    outputs: RwLock<HashMap<(String, String), WorkflowOutput>>,
    certificates: RwLock<HashMap<String, Certificate>>,
}

fn poisoned() -> WorkflowError {
    WorkflowError::storage("lock poisoned")
}

impl MemoryOutputStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an output as given, keeping its timestamps.
    ///
    /// A missing id is generated.
    pub fn insert_output(&self, mut output: WorkflowOutput) -> WorkflowResult<WorkflowOutput> {
        if output.id.is_none() {
            output.id = Some(ulid::Ulid::new().to_string().to_lowercase());
        }
        let key = (output.workflow.clone(), output.node_id.clone());
        self.outputs
            .write()
            .map_err(|_| poisoned())?
            .insert(key, output.clone());
        Ok(output)
    }

    /// Store a certificate as given, keeping its timestamps.
    pub fn insert_certificate(&self, certificate: Certificate) -> WorkflowResult<()> {
        self.certificates
            .write()
            .map_err(|_| poisoned())?
            .insert(certificate.id.clone(), certificate);
        Ok(())
    }

    /// All stored outputs.
    pub fn outputs(&self) -> WorkflowResult<Vec<WorkflowOutput>> {
        Ok(self
            .outputs
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect())
    }

    /// All stored certificates.
    pub fn certificates(&self) -> WorkflowResult<Vec<Certificate>> {
        Ok(self
            .certificates
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OutputStore for MemoryOutputStore {
    async fn get(&self, node_id: &str) -> WorkflowResult<WorkflowOutput> {
        let outputs = self.outputs.read().map_err(|_| poisoned())?;
        outputs
            .values()
            .filter(|o| o.node_id == node_id)
            .max_by_key(|o| o.updated)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("output of node {node_id}")))
    }

    async fn save(
        &self,
        output: &WorkflowOutput,
        certificate: Option<&Certificate>,
    ) -> WorkflowResult<WorkflowOutput> {
        let now = Utc::now();
        let key = (output.workflow.clone(), output.node_id.clone());

        let saved = {
            let mut outputs = self.outputs.write().map_err(|_| poisoned())?;
            let mut saved = output.clone();
            saved.updated = now;
            match outputs.get(&key) {
                Some(existing) => {
                    saved.id.clone_from(&existing.id);
                    saved.created = existing.created;
                }
                None => {
                    let taken = saved
                        .id
                        .as_ref()
                        .is_some_and(|id| outputs.values().any(|o| o.id.as_ref() == Some(id)));
                    if saved.id.is_none() || taken {
                        saved.id = Some(ulid::Ulid::new().to_string().to_lowercase());
                    }
                    saved.created = now;
                }
            }
            outputs.insert(key, saved.clone());
            saved
        };

        if let Some(certificate) = certificate {
            let mut certificate = certificate.clone();
            certificate.output_id.clone_from(&saved.id);
            certificate.workflow_id.clone_from(&saved.workflow);
            certificate.workflow_node_id.clone_from(&saved.node_id);
            self.insert_certificate(certificate)?;
        }

        Ok(saved)
    }
}

#[async_trait]
impl CertificateSource for MemoryOutputStore {
    async fn get_certificate(&self, node_id: &str) -> WorkflowResult<Certificate> {
        let certificates = self.certificates.read().map_err(|_| poisoned())?;
        certificates
            .values()
            .filter(|c| c.workflow_node_id == node_id)
            .max_by_key(|c| c.created)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("certificate of node {node_id}")))
    }
}
