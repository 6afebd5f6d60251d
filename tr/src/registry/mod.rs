//! Tool registry
//!
//! Loads tool definitions from either a local manifest folder or a remote
//! registry API, keeps them in an in-memory catalog keyed by lower-cased
//! name, and reloads the catalog automatically after a configured number of
//! executions. Refreshes replace the catalog wholesale; lookups never
//! mutate it.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

mod error;
pub mod manifest;
mod remote;
mod tool;

pub use error::RegistryError;
pub use manifest::LocalFolderSource;
pub use remote::RemoteApiSource;
pub use tool::{Tool, ToolSelector};

use crate::config::RuntimeConfig;
use crate::llm::ToolDefinition;

/// Where the catalog comes from, chosen once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    LocalFolder,
    RemoteApi,
}

/// A source of tool definitions
///
/// The registry core is the same for both modes; only the loading differs.
/// Implementations must not hold state the registry depends on - a refresh
/// simply calls `load_all` again.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Which mode this source serves
    fn mode(&self) -> RegistryMode;

    /// Load the full catalog (the source of truth for `get_all`)
    async fn load_all(&self) -> Result<Vec<Tool>, RegistryError>;

    /// Load only the selected tools
    async fn load_selected(&self, selectors: &[ToolSelector]) -> Result<Vec<Tool>, RegistryError>;
}

#[derive(Default)]
struct RegistryState {
    tools: HashMap<String, Tool>,
    call_count: u32,
    auto_refresh_count: u32,
    initialized: bool,
}

/// In-memory tool catalog with auto-refresh bookkeeping
pub struct ToolRegistry {
    source: Box<dyn CatalogSource>,
    state: tokio::sync::Mutex<RegistryState>,
    /// Serializes refresh/initialize so concurrent reloads cannot interleave
    /// partial catalogs
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ToolRegistry {
    /// Create a registry over a catalog source
    pub fn new(source: Box<dyn CatalogSource>, auto_refresh_count: u32) -> Self {
        debug!(mode = ?source.mode(), auto_refresh_count, "ToolRegistry::new: called");
        Self {
            source,
            state: tokio::sync::Mutex::new(RegistryState {
                auto_refresh_count,
                ..Default::default()
            }),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a registry from runtime configuration
    ///
    /// An explicit folder path always wins; otherwise a `tk-` prefixed
    /// locator selects remote mode and anything else names a folder.
    pub fn from_config(config: &RuntimeConfig) -> eyre::Result<Self> {
        debug!("ToolRegistry::from_config: called");
        let source: Box<dyn CatalogSource> = if let Some(folder) = &config.folder_path {
            debug!(?folder, "from_config: explicit folder path");
            Box::new(LocalFolderSource::new(folder))
        } else if config.source_locator.is_empty() {
            return Err(eyre::eyre!(
                "No tool source configured. Set source-locator to a folder path or a tk- registry key."
            ));
        } else if config.source_locator.starts_with(RuntimeConfig::API_KEY_PREFIX) {
            debug!("from_config: locator is an API key, remote mode");
            Box::new(RemoteApiSource::new(&config.api_url, &config.source_locator))
        } else {
            debug!(locator = %config.source_locator, "from_config: locator is a folder path");
            Box::new(LocalFolderSource::new(&config.source_locator))
        };

        Ok(Self::new(source, config.auto_refresh_count))
    }

    /// Which mode this registry was constructed in
    pub fn mode(&self) -> RegistryMode {
        self.source.mode()
    }

    /// Populate the catalog if it has not been loaded yet
    ///
    /// Idempotent: a second call is a no-op.
    pub async fn initialize(&self) -> Result<(), RegistryError> {
        debug!("initialize: called");
        let _gate = self.refresh_gate.lock().await;
        if self.state.lock().await.initialized {
            debug!("initialize: already initialized, no-op");
            return Ok(());
        }
        self.reload().await
    }

    /// Replace the catalog wholesale and reset the call counter
    pub async fn refresh(&self) -> Result<(), RegistryError> {
        debug!("refresh: called");
        let _gate = self.refresh_gate.lock().await;
        self.reload().await
    }

    /// Load from the source and commit; caller holds the refresh gate
    async fn reload(&self) -> Result<(), RegistryError> {
        match self.source.load_all().await {
            Ok(tools) => {
                let count = tools.len();
                let map: HashMap<String, Tool> = tools.into_iter().map(|t| (t.key(), t)).collect();
                let mut state = self.state.lock().await;
                state.tools = map;
                state.call_count = 0;
                state.initialized = true;
                info!(tool_count = count, "reload: catalog replaced");
                Ok(())
            }
            Err(e) if self.source.mode() == RegistryMode::LocalFolder => {
                // Local load failures fall back to whatever is cached
                warn!(error = %e, "reload: local load failed, keeping cached catalog");
                let mut state = self.state.lock().await;
                state.call_count = 0;
                state.initialized = true;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "reload: remote bulk load failed");
                Err(e)
            }
        }
    }

    /// All loaded tools, keyed by lower-cased name
    pub async fn get_all(&self) -> HashMap<String, Tool> {
        debug!("get_all: called");
        self.state.lock().await.tools.clone()
    }

    /// Selected tools, keyed by lower-cased name
    ///
    /// An empty selector list means "all". Selective loads refetch from the
    /// source; on any load failure the call falls back to the cached
    /// catalog instead of propagating the error. Only unpinned fetches are
    /// written back to the catalog: a version-pinned tool is returned to
    /// the caller without displacing the cached production version.
    pub async fn get_by_names(&self, selectors: &[ToolSelector]) -> HashMap<String, Tool> {
        debug!(selector_count = selectors.len(), "get_by_names: called");
        if selectors.is_empty() {
            debug!("get_by_names: empty selector list, returning all");
            return self.get_all().await;
        }

        let pinned: Vec<String> = selectors
            .iter()
            .filter(|s| s.version.is_some())
            .map(|s| s.name.to_lowercase())
            .collect();

        match self.source.load_selected(selectors).await {
            Ok(tools) => {
                debug!(tool_count = tools.len(), "get_by_names: selective load ok");
                let mut state = self.state.lock().await;
                let mut result = HashMap::with_capacity(tools.len());
                for tool in tools {
                    if !pinned.contains(&tool.key()) {
                        state.tools.insert(tool.key(), tool.clone());
                    }
                    result.insert(tool.key(), tool);
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "get_by_names: selective load failed, using cached catalog");
                let state = self.state.lock().await;
                selectors
                    .iter()
                    .filter_map(|s| {
                        let key = s.name.to_lowercase();
                        state.tools.get(&key).map(|t| (key, t.clone()))
                    })
                    .collect()
            }
        }
    }

    /// Declaration shapes for the selected tools, for the model catalog
    pub async fn definitions(&self, selectors: &[ToolSelector]) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .get_by_names(selectors)
            .await
            .values()
            .map(Tool::definition)
            .collect();
        // Stable ordering for request bodies and tests
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Record one tool execution, refreshing when the threshold is reached
    ///
    /// Infallible: a failed auto-refresh is logged and the counter still
    /// resets, so a registry hiccup cannot fail the execution that
    /// triggered it.
    pub async fn record_call(&self) {
        let triggered = {
            let mut state = self.state.lock().await;
            state.call_count += 1;
            debug!(call_count = state.call_count, threshold = state.auto_refresh_count, "record_call: incremented");
            state.auto_refresh_count > 0 && state.call_count >= state.auto_refresh_count
        };

        if triggered {
            info!("record_call: auto-refresh threshold reached");
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "record_call: auto-refresh failed");
                self.state.lock().await.call_count = 0;
            }
        }
    }

    /// Change the auto-refresh threshold; 0 disables auto-refresh
    pub async fn set_auto_refresh_count(&self, count: u32) {
        debug!(count, "set_auto_refresh_count: called");
        self.state.lock().await.auto_refresh_count = count;
    }

    /// Executions recorded since the last refresh
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }

    /// Distinct script kinds referenced by loaded tools (for reprobing)
    pub async fn referenced_kinds(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut kinds: Vec<String> = state.tools.values().map(|t| t.script_kind.clone()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
