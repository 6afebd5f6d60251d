//! Local-folder catalog source
//!
//! A tool folder holds a `tools.json` manifest plus one script file per
//! tool version, named `<name>-<version>.<ext>` (`.py` for python, `.sh`
//! otherwise). The manifest declares every known version and which one is
//! the production version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::environment::ScriptKind;

use super::error::RegistryError;
use super::tool::{Tool, ToolSelector};
use super::{CatalogSource, RegistryMode};

/// Manifest file name inside a tool folder
pub const MANIFEST_FILE: &str = "tools.json";

/// One tool record in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default)]
    pub id: String,
    pub production_version_name: String,
    pub versions: HashMap<String, ManifestVersion>,
}

/// One version of a tool in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestVersion {
    #[serde(default)]
    pub description: String,
    pub input_schema: Value,
    pub script_type: String,
}

/// Catalog source that reads tools from a manifest folder
pub struct LocalFolderSource {
    folder: PathBuf,
}

impl LocalFolderSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        debug!(?folder, "LocalFolderSource::new: called");
        Self { folder }
    }

    fn manifest_path(&self) -> PathBuf {
        self.folder.join(MANIFEST_FILE)
    }

    fn read_manifest(&self) -> Result<Vec<ManifestEntry>, RegistryError> {
        let path = self.manifest_path();
        debug!(?path, "read_manifest: called");
        let content = std::fs::read_to_string(&path).map_err(|source| RegistryError::ManifestNotFound {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| RegistryError::ManifestParse { path, source })
    }

    /// Build a Tool from a manifest entry and a chosen version
    fn resolve_version(&self, entry: &ManifestEntry, version_name: &str) -> Result<Tool, RegistryError> {
        debug!(name = %entry.name, %version_name, "resolve_version: called");
        let version = entry
            .versions
            .get(version_name)
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: entry.name.clone(),
                version: version_name.to_string(),
            })?;

        let script_path = script_file(&self.folder, &entry.name, version_name, &version.script_type);
        if !script_path.exists() {
            debug!(?script_path, "resolve_version: script file missing");
            return Err(RegistryError::ScriptMissing { path: script_path });
        }

        Ok(Tool {
            id: entry.id.clone(),
            name: entry.name.clone(),
            description: version.description.clone(),
            input_schema: version.input_schema.clone(),
            script: String::new(),
            script_path: Some(script_path),
            script_kind: version.script_type.clone(),
            version_name: version_name.to_string(),
        })
    }

    /// Resolve the production version of an entry, or `None` with a warning
    fn resolve_production(&self, entry: &ManifestEntry) -> Option<Tool> {
        match self.resolve_version(entry, &entry.production_version_name) {
            Ok(tool) => Some(tool),
            Err(e) => {
                warn!(name = %entry.name, error = %e, "resolve_production: skipping tool");
                None
            }
        }
    }
}

/// Script file path by the folder naming convention
fn script_file(folder: &Path, name: &str, version: &str, script_type: &str) -> PathBuf {
    let ext = ScriptKind::parse(script_type)
        .map(|k| k.extension())
        .unwrap_or("sh");
    folder.join(format!("{}-{}.{}", name, version, ext))
}

#[async_trait]
impl CatalogSource for LocalFolderSource {
    fn mode(&self) -> RegistryMode {
        RegistryMode::LocalFolder
    }

    async fn load_all(&self) -> Result<Vec<Tool>, RegistryError> {
        debug!(folder = ?self.folder, "load_all: called");
        let entries = self.read_manifest()?;
        debug!(entry_count = entries.len(), "load_all: manifest parsed");

        // Unresolvable entries are skipped, not fatal - one broken tool must
        // not take the whole catalog down.
        Ok(entries.iter().filter_map(|e| self.resolve_production(e)).collect())
    }

    async fn load_selected(&self, selectors: &[ToolSelector]) -> Result<Vec<Tool>, RegistryError> {
        debug!(selector_count = selectors.len(), "load_selected: called");
        let entries = self.read_manifest()?;

        let mut tools = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let wanted = selector.name.to_lowercase();
            let entry = entries
                .iter()
                .find(|e| e.name.to_lowercase() == wanted)
                .ok_or_else(|| RegistryError::ToolNotFound {
                    name: selector.name.clone(),
                })?;

            let version = selector.version.as_deref().unwrap_or(&entry.production_version_name);
            tools.push(self.resolve_version(entry, version)?);
        }
        Ok(tools)
    }
}
