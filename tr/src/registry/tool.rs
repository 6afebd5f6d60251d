//! Tool record and selector types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolDefinition;

/// An externally defined script tool, immutable once loaded
///
/// Exactly one of `script` / `script_path` is authoritative: local-folder
/// loads point at a file on disk, remote loads carry the source inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Registry identifier (may be empty for local tools without one)
    #[serde(default)]
    pub id: String,

    /// Tool name - the case-insensitive lookup key
    pub name: String,

    /// Human-readable description shown to the model
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the accepted arguments
    pub input_schema: Value,

    /// Inline script source (remote mode)
    #[serde(default)]
    pub script: String,

    /// On-disk script path (local-folder mode)
    #[serde(default)]
    pub script_path: Option<PathBuf>,

    /// Runtime kind string from the manifest (`bash`, `python`, ...)
    pub script_kind: String,

    /// Which version of the tool this record is
    pub version_name: String,
}

impl Tool {
    /// Lower-cased registry key
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Declaration shape sent to the model
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.input_schema.clone())
    }
}

/// Selects a tool by name, optionally pinning a version
///
/// Without a version the registry resolves the tool's production version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSelector {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolSelector {
    /// Select the production version of a tool
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Select a specific version
    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Parse a `NAME` or `NAME:VERSION` spec
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((name, version)) if !version.is_empty() => ToolSelector::versioned(name, version),
            Some((name, _)) => ToolSelector::named(name),
            None => ToolSelector::named(spec),
        }
    }
}

impl From<&str> for ToolSelector {
    fn from(name: &str) -> Self {
        ToolSelector::named(name)
    }
}
