//! Idempotent certificate deployment for certflow workflows.
//!
//! A deploy node takes the certificate issued by an earlier node and pushes
//! it to a target system through a pluggable [`Deployer`]. It deploys at most
//! once per certificate version: a node whose last output succeeded after the
//! certificate was created is skipped.
//!
//! # Run flow
//!
//! ```text
//! prior output ──▶ certificate ──▶ gate ──▶ access ──▶ deployer ──▶ save output
//!                                   │
//!                                   ▼
//!                                Skipped
//! ```
//!
//! Every collaborator sits behind a trait ([`OutputStore`],
//! [`CertificateSource`], [`AccessRepository`](certflow_access::AccessRepository),
//! [`ProgressSink`]) and deployers are chosen by provider type from a
//! [`DeployerRegistry`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use certflow_workflow::{CertflowConfig, DeployNode, NodeServices, RunContext, WorkflowNode};
//!
//! let config = CertflowConfig::load()?;
//! let services = NodeServices::from_config(&config).await?;
//! let node: WorkflowNode = serde_json::from_str(&raw_node)?;
//!
//! let outcome = DeployNode::new(node, services)
//!     .execute(&RunContext::new("wf1"))
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod deployer;
pub mod error;
pub mod node;
pub mod processor;
pub mod progress;
pub mod store;
pub mod types;

pub use config::{CertflowConfig, DeployerSettings, StoreConfig, WebhookSettings};
pub use context::RunContext;
pub use deployer::{DeployConfig, DeployRequest, Deployer, DeployerError, DeployerRegistry};
pub use error::{WorkflowError, WorkflowResult};
pub use node::{CertificateRef, NodeConfig, NodeType, WorkflowNode};
pub use processor::{processor_for, DeployNode, DeployOutcome, NodeProcessor, NodeServices};
pub use progress::{MultiProgress, ProgressSink, RunLog, TracingProgress};
pub use store::{CertificateSource, MemoryOutputStore, OutputStore, SqliteOutputStore};
pub use types::{Certificate, CertificateMaterial, WorkflowOutput};
