//! Remote-API catalog source
//!
//! Talks to an external tool registry: a bulk "list tools" endpoint and a
//! batch "get individual tools" endpoint, both authenticated with an opaque
//! key. Remote tools carry their script source inline.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::error::RegistryError;
use super::tool::{Tool, ToolSelector};
use super::{CatalogSource, RegistryMode};

/// Wire shape of a tool record returned by the registry API
#[derive(Debug, Deserialize)]
struct RemoteTool {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    input_schema: serde_json::Value,
    #[serde(default)]
    script: String,
    script_type: String,
    version_name: String,
}

impl From<RemoteTool> for Tool {
    fn from(remote: RemoteTool) -> Self {
        Tool {
            id: remote.id,
            name: remote.name,
            description: remote.description,
            input_schema: remote.input_schema,
            script: remote.script,
            script_path: None,
            script_kind: remote.script_type,
            version_name: remote.version_name,
        }
    }
}

/// Body of the batch endpoint response
#[derive(Debug, Deserialize)]
struct BatchResponse {
    tools: Vec<RemoteTool>,
}

/// Catalog source backed by the remote registry API
pub struct RemoteApiSource {
    api_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl RemoteApiSource {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_url = api_url.into();
        debug!(%api_url, "RemoteApiSource::new: called");
        Self {
            api_url,
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "check_status: non-2xx from registry");
            return Err(RegistryError::Api { status, message });
        }
        Ok(response)
    }
}

#[async_trait]
impl CatalogSource for RemoteApiSource {
    fn mode(&self) -> RegistryMode {
        RegistryMode::RemoteApi
    }

    async fn load_all(&self) -> Result<Vec<Tool>, RegistryError> {
        let url = format!("{}/tools", self.api_url);
        debug!(%url, "load_all: called");

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let remote: Vec<RemoteTool> = serde_json::from_str(&body)?;
        debug!(tool_count = remote.len(), "load_all: catalog fetched");

        Ok(remote.into_iter().map(Tool::from).collect())
    }

    async fn load_selected(&self, selectors: &[ToolSelector]) -> Result<Vec<Tool>, RegistryError> {
        let url = format!("{}/tools/batch", self.api_url);
        debug!(%url, selector_count = selectors.len(), "load_selected: called");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({ "tools": selectors }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let batch: BatchResponse = serde_json::from_str(&body)?;
        debug!(tool_count = batch.tools.len(), "load_selected: batch fetched");

        Ok(batch.tools.into_iter().map(Tool::from).collect())
    }
}
