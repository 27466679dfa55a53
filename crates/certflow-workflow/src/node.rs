//! Workflow nodes and their configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{WorkflowError, WorkflowResult};

/// String-keyed node configuration as produced by the workflow designer.
pub type NodeConfig = Map<String, Value>;

/// Config key holding the `<nodeId>#<field>` certificate reference.
pub const CONFIG_CERTIFICATE: &str = "certificate";
/// Config key holding the access record id.
pub const CONFIG_ACCESS: &str = "access";
/// Config key selecting the deployer implementation.
pub const CONFIG_PROVIDER_TYPE: &str = "providerType";
/// Config key holding `{key, value}` pairs forwarded to deployers.
pub const CONFIG_VARIABLES: &str = "variables";

/// Kind of step a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point of the workflow.
    Start,
    /// Issues a certificate.
    Apply,
    /// Pushes a certificate to a target system.
    Deploy,
    /// Sends a notification.
    Notify,
    /// Fans out into conditions.
    Branch,
    /// Guards a branch.
    Condition,
}

impl NodeType {
    /// Get the node type as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Apply => "apply",
            Self::Deploy => "deploy",
            Self::Notify => "notify",
            Self::Branch => "branch",
            Self::Condition => "condition",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in a certificate workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Node identifier, unique within the workflow.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of step.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Resolved configuration.
    #[serde(default)]
    pub config: NodeConfig,
    /// Whether the designer validated the configuration.
    #[serde(default)]
    pub validated: bool,
}

impl WorkflowNode {
    /// Create a node with an empty configuration.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            config: NodeConfig::new(),
            validated: false,
        }
    }

    /// Set a configuration value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// A string configuration value, empty when missing or not a string.
    #[must_use]
    pub fn get_config_string(&self, key: &str) -> String {
        self.config
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }

    /// The `variables` list as `(key, value)` pairs.
    #[must_use]
    pub fn get_config_variables(&self) -> Vec<(String, String)> {
        config_variables(&self.config)
    }
}

/// Read the `variables` list of a node config as `(key, value)` pairs.
///
/// Entries without a string key are skipped; non-string values are rendered
/// as JSON.
#[must_use]
pub fn config_variables(config: &NodeConfig) -> Vec<(String, String)> {
    let Some(Value::Array(items)) = config.get(CONFIG_VARIABLES) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let key = item.get("key")?.as_str()?.to_owned();
            let value = match item.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Some((key, value))
        })
        .collect()
}

/// Separator between the node id and the field tag of a certificate reference.
pub const CERTIFICATE_REF_SEPARATOR: char = '#';

/// A parsed `<certificateNodeId>#<fieldTag>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRef {
    /// Node that issued the certificate.
    pub node_id: String,
    /// Output field of that node (for example `certificate`).
    pub field: String,
}

impl CertificateRef {
    /// Parse a reference. Exactly two `#`-separated parts are accepted.
    pub fn parse(raw: &str) -> WorkflowResult<Self> {
        let parts: Vec<&str> = raw.split(CERTIFICATE_REF_SEPARATOR).collect();
        match parts.as_slice() {
            [node_id, field] => Ok(Self {
                node_id: (*node_id).to_owned(),
                field: (*field).to_owned(),
            }),
            _ => Err(WorkflowError::configuration(format!(
                "invalid certificate reference: {raw:?}"
            ))),
        }
    }
}

impl fmt::Display for CertificateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.node_id, CERTIFICATE_REF_SEPARATOR, self.field)
    }
}
