//! Progress notes emitted by nodes while they run.
//!
//! Notes are a human-readable trace of what a node did. They never drive
//! control flow: sinks are fire-and-forget and cannot fail the run.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::RunContext;

/// Receives progress notes from running nodes.
pub trait ProgressSink: Send + Sync {
    /// Record `message` for `node_name`, with an optional error detail.
    fn add_output(&self, ctx: &RunContext, node_name: &str, message: &str, detail: Option<&str>);
}

/// Emits progress notes as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn add_output(&self, ctx: &RunContext, node_name: &str, message: &str, detail: Option<&str>) {
        match detail {
            Some(detail) => warn!(
                workflow_id = %ctx.workflow_id(),
                node = %node_name,
                detail = %detail,
                "{message}"
            ),
            None => info!(workflow_id = %ctx.workflow_id(), node = %node_name, "{message}"),
        }
    }
}

/// One note in a run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogOutput {
    /// When the note was recorded.
    pub time: DateTime<Utc>,
    /// Node name the note belongs to.
    pub title: String,
    /// The note itself.
    pub content: String,
    /// Error detail, empty when the note is not a failure.
    #[serde(default)]
    pub error: String,
}

/// All notes recorded for one node during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogItem {
    /// Node name.
    pub node_name: String,
    /// Notes in the order they were recorded.
    pub outputs: Vec<RunLogOutput>,
    /// Last error detail recorded for the node, if any.
    #[serde(default)]
    pub error: String,
}

/// Collects progress notes into a per-node run log.
///
/// Cloning shares the underlying log.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    items: Arc<Mutex<Vec<RunLogItem>>>,
}

impl RunLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the log, one item per node in first-seen order.
    #[must_use]
    pub fn items(&self) -> Vec<RunLogItem> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Flat list of note contents, in recording order per node.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.items()
            .into_iter()
            .flat_map(|item| item.outputs.into_iter().map(|o| o.content))
            .collect()
    }

    /// Whether any recorded note carries an error detail.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.items().iter().any(|item| !item.error.is_empty())
    }
}

impl ProgressSink for RunLog {
    fn add_output(&self, _ctx: &RunContext, node_name: &str, message: &str, detail: Option<&str>) {
        let Ok(mut items) = self.items.lock() else {
            return;
        };

        let output = RunLogOutput {
            time: Utc::now(),
            title: node_name.to_owned(),
            content: message.to_owned(),
            error: detail.unwrap_or_default().to_owned(),
        };

        let index = match items.iter().position(|item| item.node_name == node_name) {
            Some(index) => index,
            None => {
                items.push(RunLogItem {
                    node_name: node_name.to_owned(),
                    outputs: Vec::new(),
                    error: String::new(),
                });
                items.len() - 1
            }
        };

        let item = &mut items[index];
        if let Some(detail) = detail {
            item.error = detail.to_owned();
        }
        item.outputs.push(output);
    }
}

/// Forwards every note to several sinks.
#[derive(Clone, Default)]
pub struct MultiProgress {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl MultiProgress {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for MultiProgress {
    fn add_output(&self, ctx: &RunContext, node_name: &str, message: &str, detail: Option<&str>) {
        for sink in &self.sinks {
            sink.add_output(ctx, node_name, message, detail);
        }
    }
}

impl std::fmt::Debug for MultiProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiProgress")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
