//! Tool invocation facade
//!
//! [`ToolInvoker`] is the single entry point for running a tool: it records
//! the call against the registry's auto-refresh counter, then hands the
//! resolved tool to the process executor with the injected environment map.
//! [`ToolHandler`] binds an invoker to a selector list and resolves the
//! model's tool calls by name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::executor::{ExecutionResult, ProcessExecutor};
use crate::llm::{ToolCall, ToolDefinition};
use crate::registry::{Tool, ToolRegistry, ToolSelector};

/// Executes tools against the registry and executor
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    executor: ProcessExecutor,
    env: RwLock<HashMap<String, String>>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, executor: ProcessExecutor) -> Self {
        debug!("ToolInvoker::new: called");
        Self {
            registry,
            executor,
            env: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Replace the environment map injected into every execution as `openv`
    pub async fn set_env(&self, env: HashMap<String, String>) {
        debug!(entries = env.len(), "set_env: called");
        *self.env.write().await = env;
    }

    /// Add or overwrite one injected environment entry
    pub async fn insert_env(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        debug!(%key, "insert_env: called");
        self.env.write().await.insert(key, value.into());
    }

    /// Run a resolved tool
    ///
    /// The call is recorded before execution so the auto-refresh counter
    /// advances even when the script fails.
    pub async fn execute(&self, tool: &Tool, args: &Value) -> ExecutionResult {
        debug!(tool = %tool.name, "execute: called");
        self.registry.record_call().await;
        let env = self.env.read().await.clone();
        self.executor.execute(tool, args, &env).await
    }
}

/// Resolves and executes the model's tool calls for one conversation
///
/// Bound to a selector list so a conversation can expose a subset of the
/// catalog (or all of it, with an empty list).
pub struct ToolHandler {
    invoker: Arc<ToolInvoker>,
    selectors: Vec<ToolSelector>,
}

impl ToolHandler {
    pub fn new(invoker: Arc<ToolInvoker>, selectors: Vec<ToolSelector>) -> Self {
        debug!(selector_count = selectors.len(), "ToolHandler::new: called");
        Self { invoker, selectors }
    }

    /// Declaration shapes for the bound tools
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        self.invoker.registry.definitions(&self.selectors).await
    }

    /// Resolve and run one tool call from the model
    ///
    /// Unknown names and unparseable arguments resolve through the `error`
    /// channel without executing anything.
    pub async fn handle(&self, call: &ToolCall) -> ExecutionResult {
        debug!(tool = %call.name, id = %call.id, "handle: called");

        let tools = self.invoker.registry.get_by_names(&self.selectors).await;
        let tool = match tools.get(&call.name.to_lowercase()) {
            Some(tool) => tool,
            None => {
                warn!(tool = %call.name, "handle: tool not available");
                return ExecutionResult::error(format!("Tool {} not found in available tools", call.name));
            }
        };

        let args = match call.arguments.parse() {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "handle: arguments unparseable");
                return ExecutionResult::error(format!("Failed to parse tool arguments: {}", e));
            }
        };

        self.invoker.execute(tool, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentProber;
    use crate::llm::ToolArguments;
    use crate::registry::mock::{sample_tool, MockCatalogSource};
    use std::time::Duration;

    fn handler_with(tools: Vec<Tool>, selectors: Vec<ToolSelector>) -> (Arc<ToolInvoker>, ToolHandler) {
        let registry = Arc::new(ToolRegistry::new(Box::new(MockCatalogSource::remote(tools)), 0));
        let executor = ProcessExecutor::new(Arc::new(EnvironmentProber::new(false)), Duration::from_secs(30));
        let invoker = Arc::new(ToolInvoker::new(registry, executor));
        let handler = ToolHandler::new(invoker.clone(), selectors);
        (invoker, handler)
    }

    #[tokio::test]
    async fn test_handle_runs_named_tool() {
        let mut tool = sample_tool("echoer");
        tool.script = "cat".to_string();
        let (invoker, handler) = handler_with(vec![tool], vec![]);
        invoker.registry().initialize().await.unwrap();

        let result = handler
            .handle(&ToolCall {
                id: "call_1".to_string(),
                name: "Echoer".to_string(),
                arguments: ToolArguments::Parsed(serde_json::json!({"msg": "hi"})),
            })
            .await;

        assert!(result.error.is_none());
        assert!(result.output.unwrap().contains("\"msg\":\"hi\""));
    }

    #[tokio::test]
    async fn test_handle_unknown_tool() {
        let (invoker, handler) = handler_with(vec![sample_tool("echoer")], vec![]);
        invoker.registry().initialize().await.unwrap();

        let result = handler
            .handle(&ToolCall {
                id: "call_1".to_string(),
                name: "missing".to_string(),
                arguments: ToolArguments::Parsed(serde_json::json!({})),
            })
            .await;

        assert_eq!(
            result.error.as_deref(),
            Some("Tool missing not found in available tools")
        );
        assert_eq!(invoker.registry().call_count().await, 0);
    }

    #[tokio::test]
    async fn test_handle_unparseable_arguments_do_not_execute() {
        let (invoker, handler) = handler_with(vec![sample_tool("echoer")], vec![]);
        invoker.registry().initialize().await.unwrap();

        let result = handler
            .handle(&ToolCall {
                id: "call_1".to_string(),
                name: "echoer".to_string(),
                arguments: ToolArguments::Raw("{not json".to_string()),
            })
            .await;

        assert!(result.error.unwrap().starts_with("Failed to parse tool arguments:"));
        assert_eq!(invoker.registry().call_count().await, 0);
    }

    #[tokio::test]
    async fn test_execute_records_call() {
        let mut tool = sample_tool("echoer");
        tool.script = "cat".to_string();
        let (invoker, handler) = handler_with(vec![tool], vec![]);
        invoker.registry().initialize().await.unwrap();

        handler
            .handle(&ToolCall {
                id: "call_1".to_string(),
                name: "echoer".to_string(),
                arguments: ToolArguments::Parsed(serde_json::json!({})),
            })
            .await;

        assert_eq!(invoker.registry().call_count().await, 1);
    }

    #[tokio::test]
    async fn test_env_injected_as_openv() {
        let mut tool = sample_tool("echoer");
        tool.script = "cat".to_string();
        let (invoker, handler) = handler_with(vec![tool], vec![]);
        invoker.registry().initialize().await.unwrap();
        invoker.insert_env("TOKEN", "tk-test").await;

        let result = handler
            .handle(&ToolCall {
                id: "call_1".to_string(),
                name: "echoer".to_string(),
                arguments: ToolArguments::Parsed(serde_json::json!({})),
            })
            .await;

        let output = result.output.unwrap();
        assert!(output.contains("openv"));
        assert!(output.contains("tk-test"));
    }
}
