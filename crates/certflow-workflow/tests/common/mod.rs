//! Common test utilities for deploy node integration tests.
#![allow(dead_code, clippy::unwrap_used)]

pub mod fixtures;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use certflow_access::{AccessRecord, AccessRepository, AccessResult, MemoryAccess};
use certflow_workflow::{
    Certificate, CertificateSource, DeployNode, DeployRequest, Deployer, DeployerError,
    DeployerRegistry, MemoryOutputStore, NodeServices, OutputStore, RunContext, RunLog,
    WorkflowError, WorkflowNode, WorkflowOutput, WorkflowResult,
};

/// Provider type of the recording deployer.
pub const COUNTING_PROVIDER: &str = "counting";

/// Counts calls made to each collaborator.
#[derive(Debug, Default)]
pub struct Calls {
    pub output_get: AtomicUsize,
    pub output_save: AtomicUsize,
    pub certificate_get: AtomicUsize,
    pub access_get: AtomicUsize,
    pub deploy: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Output store and certificate source that records calls.
pub struct RecordingStore {
    pub inner: MemoryOutputStore,
    calls: Arc<Calls>,
    fail_save: AtomicBool,
}

#[async_trait]
impl OutputStore for RecordingStore {
    async fn get(&self, node_id: &str) -> WorkflowResult<WorkflowOutput> {
        self.calls.output_get.fetch_add(1, Ordering::SeqCst);
        self.inner.get(node_id).await
    }

    async fn save(
        &self,
        output: &WorkflowOutput,
        certificate: Option<&Certificate>,
    ) -> WorkflowResult<WorkflowOutput> {
        self.calls.output_save.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(WorkflowError::Persistence("database is locked".to_owned()));
        }
        self.inner.save(output, certificate).await
    }
}

#[async_trait]
impl CertificateSource for RecordingStore {
    async fn get_certificate(&self, node_id: &str) -> WorkflowResult<Certificate> {
        self.calls.certificate_get.fetch_add(1, Ordering::SeqCst);
        self.inner.get_certificate(node_id).await
    }
}

/// Access repository that records calls.
pub struct RecordingAccess {
    pub inner: MemoryAccess,
    calls: Arc<Calls>,
}

#[async_trait]
impl AccessRepository for RecordingAccess {
    async fn get_by_id(&self, id: &str) -> AccessResult<AccessRecord> {
        self.calls.access_get.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }
}

/// Deployer that counts invocations and can be told to fail.
struct CountingDeployer {
    calls: Arc<Calls>,
    fail: bool,
}

#[async_trait]
impl Deployer for CountingDeployer {
    async fn deploy(&self, _ctx: &RunContext) -> Result<(), DeployerError> {
        self.calls.deploy.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DeployerError::Rejected {
                status: 500,
                body: "internal error".to_owned(),
            });
        }
        Ok(())
    }
}

/// Every collaborator of a deploy node, wired with recording fakes.
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub accesses: Arc<RecordingAccess>,
    pub calls: Arc<Calls>,
    pub log: RunLog,
    pub requests: Arc<Mutex<Vec<DeployRequest>>>,
    fail_deploy: Arc<AtomicBool>,
}

impl Harness {
    pub fn new() -> Self {
        let calls = Arc::new(Calls::default());
        Self {
            store: Arc::new(RecordingStore {
                inner: MemoryOutputStore::new(),
                calls: calls.clone(),
                fail_save: AtomicBool::new(false),
            }),
            accesses: Arc::new(RecordingAccess {
                inner: MemoryAccess::new(),
                calls: calls.clone(),
            }),
            calls,
            log: RunLog::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_deploy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed a certificate.
    pub fn with_certificate(self, certificate: Certificate) -> Self {
        self.store.inner.insert_certificate(certificate).unwrap();
        self
    }

    /// Seed a prior output.
    pub fn with_output(self, output: WorkflowOutput) -> Self {
        self.store.inner.insert_output(output).unwrap();
        self
    }

    /// Seed an access record.
    pub async fn with_access(self, record: AccessRecord) -> Self {
        self.accesses.inner.insert(record).await;
        self
    }

    pub fn failing_deploy(self) -> Self {
        self.fail_deploy.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_save(self) -> Self {
        self.store.fail_save.store(true, Ordering::SeqCst);
        self
    }

    pub fn services(&self) -> NodeServices {
        let mut registry = DeployerRegistry::new();
        let calls = self.calls.clone();
        let requests = self.requests.clone();
        let fail = self.fail_deploy.clone();
        registry.register(COUNTING_PROVIDER, move |request| {
            requests.lock().unwrap().push(request);
            Ok(Box::new(CountingDeployer {
                calls: calls.clone(),
                fail: fail.load(Ordering::SeqCst),
            }) as Box<dyn Deployer>)
        });

        NodeServices::new(
            self.store.clone(),
            self.store.clone(),
            self.accesses.clone(),
            Arc::new(registry),
        )
        .with_progress(Arc::new(self.log.clone()))
    }

    pub fn deploy_node(&self, node: WorkflowNode) -> DeployNode {
        DeployNode::new(node, self.services())
    }

    pub fn outputs(&self) -> Vec<WorkflowOutput> {
        self.store.inner.outputs().unwrap()
    }
}
