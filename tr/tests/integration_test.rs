//! Integration tests for ToolRelay
//!
//! These tests exercise the end-to-end path: a real tool folder on disk,
//! the registry, the process executor, and the conversation driver over a
//! scripted model client.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use toolrelay::config::RuntimeConfig;
use toolrelay::driver::ConversationDriver;
use toolrelay::environment::EnvironmentProber;
use toolrelay::executor::ProcessExecutor;
use toolrelay::invoker::{ToolHandler, ToolInvoker};
use toolrelay::llm::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage, ToolArguments, ToolCall,
};
use toolrelay::registry::{ToolRegistry, ToolSelector};

// =============================================================================
// Fixtures
// =============================================================================

/// Model client that serves scripted responses in order
#[derive(Debug)]
struct ScriptedClient {
    responses: Mutex<Vec<CompletionResponse>>,
}

impl ScriptedClient {
    fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::InvalidResponse("script exhausted".to_string()));
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: Some(text.to_string()),
        tool_calls: vec![],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage::default(),
    }
}

fn tool_call_response(id: &str, name: &str, input: serde_json::Value) -> CompletionResponse {
    CompletionResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: ToolArguments::Parsed(input),
        }],
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage::default(),
    }
}

/// Write a two-tool folder: `echo` (v1 production, v2 available) and `shout`
fn write_tool_folder(dir: &Path) {
    let manifest = serde_json::json!([
        {
            "name": "echo",
            "id": "tool_echo",
            "production_version_name": "v1",
            "versions": {
                "v1": {
                    "description": "Echo the arguments back",
                    "input_schema": {"type": "object", "properties": {"msg": {"type": "string"}}},
                    "script_type": "bash"
                },
                "v2": {
                    "description": "Echo, second edition",
                    "input_schema": {"type": "object", "properties": {"msg": {"type": "string"}}},
                    "script_type": "bash"
                }
            }
        },
        {
            "name": "shout",
            "id": "tool_shout",
            "production_version_name": "v1",
            "versions": {
                "v1": {
                    "description": "Upper-case the payload",
                    "input_schema": {"type": "object"},
                    "script_type": "bash"
                }
            }
        }
    ]);

    std::fs::write(dir.join("tools.json"), serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
    std::fs::write(dir.join("echo-v1.sh"), "cat\n").unwrap();
    std::fs::write(dir.join("echo-v2.sh"), "read -r line\necho \"v2: $line\"\n").unwrap();
    std::fs::write(dir.join("shout-v1.sh"), "tr '[:lower:]' '[:upper:]'\n").unwrap();
}

fn runtime_config(dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        folder_path: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

fn invoker_for(registry: Arc<ToolRegistry>) -> Arc<ToolInvoker> {
    let prober = Arc::new(EnvironmentProber::new(false));
    let executor = ProcessExecutor::new(prober, Duration::from_secs(30));
    Arc::new(ToolInvoker::new(registry, executor))
}

// =============================================================================
// Registry + Executor Tests
// =============================================================================

#[tokio::test]
async fn test_local_folder_end_to_end() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let tools = registry.get_all().await;
    assert_eq!(tools.len(), 2);
    assert_eq!(tools["echo"].name, "echo");
    assert_eq!(tools["echo"].version_name, "v1");
    assert_eq!(tools["echo"].script_kind, "bash");
    assert_eq!(tools["echo"].description, "Echo the arguments back");
    assert!(tools["echo"].input_schema["properties"]["msg"].is_object());

    let invoker = invoker_for(registry.clone());
    let result = invoker
        .execute(&tools["echo"], &serde_json::json!({"msg": "hello"}))
        .await;

    assert!(result.error.is_none());
    let output = result.output.unwrap();
    assert!(output.contains("\"msg\":\"hello\""));
    assert!(output.contains("openv"));
}

#[tokio::test]
async fn test_pinned_version_resolves() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let tools = registry.get_by_names(&[ToolSelector::versioned("echo", "v2")]).await;
    assert_eq!(tools["echo"].version_name, "v2");

    let invoker = invoker_for(registry.clone());
    let result = invoker.execute(&tools["echo"], &serde_json::json!({})).await;
    assert!(result.output.unwrap().starts_with("v2:"));

    // The pinned fetch must not displace production in the catalog
    assert_eq!(registry.get_all().await["echo"].version_name, "v1");
}

#[tokio::test]
async fn test_injected_env_reaches_script() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let invoker = invoker_for(registry.clone());
    invoker.insert_env("SERVICE_TOKEN", "tk-integration").await;

    let tools = registry.get_all().await;
    let result = invoker.execute(&tools["echo"], &serde_json::json!({})).await;

    assert!(result.output.unwrap().contains("tk-integration"));
}

#[tokio::test]
async fn test_auto_refresh_picks_up_manifest_changes() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();
    registry.set_auto_refresh_count(2).await;

    // Flip production to v2 on disk; the registry should notice after two
    // recorded executions
    let manifest_path = temp.path().join("tools.json");
    let content = std::fs::read_to_string(&manifest_path).unwrap();
    std::fs::write(
        &manifest_path,
        content.replace("\"production_version_name\": \"v1\"", "\"production_version_name\": \"v2\""),
    )
    .unwrap();

    registry.record_call().await;
    assert_eq!(registry.get_all().await["echo"].version_name, "v1");

    registry.record_call().await;
    assert_eq!(registry.get_all().await["echo"].version_name, "v2");
    assert_eq!(registry.call_count().await, 0);
}

// =============================================================================
// Conversation Driver Tests
// =============================================================================

#[tokio::test]
async fn test_chat_turn_runs_tool_from_disk() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let handler = ToolHandler::new(invoker_for(registry.clone()), vec![]);
    let client = Arc::new(ScriptedClient::new(vec![
        tool_call_response("call_1", "shout", serde_json::json!({"msg": "quietly"})),
        text_response("The tool answered."),
    ]));

    let mut driver = ConversationDriver::new(client, handler, 1024, 8);
    let outcome = driver.invoke("shout for me").await;

    assert_eq!(outcome.text, "The tool answered.");
    assert_eq!(outcome.turns, 2);
    assert_eq!(registry.call_count().await, 1);
    // user, assistant tool-use, tool result, assistant text
    assert_eq!(driver.history().len(), 4);
}

#[tokio::test]
async fn test_chat_reset_between_turns() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let handler = ToolHandler::new(invoker_for(registry), vec![]);
    let client = Arc::new(ScriptedClient::new(vec![
        text_response("first"),
        text_response("second"),
    ]));

    let mut driver = ConversationDriver::new(client, handler, 1024, 8);
    driver.invoke("one").await;
    assert_eq!(driver.history().len(), 2);

    driver.reset_conversation();
    assert!(driver.history().is_empty());

    let outcome = driver.invoke("two").await;
    assert_eq!(outcome.text, "second");
    assert_eq!(driver.history().len(), 2);
}

#[tokio::test]
async fn test_restricted_tool_set() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    // Only `echo` is bound; `shout` exists in the catalog but not here
    let handler = ToolHandler::new(invoker_for(registry), vec![ToolSelector::named("echo")]);
    assert_eq!(handler.definitions().await.len(), 1);

    let result = handler
        .handle(&ToolCall {
            id: "call_1".to_string(),
            name: "shout".to_string(),
            arguments: ToolArguments::Parsed(serde_json::json!({})),
        })
        .await;

    assert_eq!(result.error.as_deref(), Some("Tool shout not found in available tools"));
}

#[tokio::test]
async fn test_environment_failure_flows_to_model_not_error() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    // Manifest references a runtime this build does not support
    let manifest = serde_json::json!([
        {
            "name": "rubytool",
            "production_version_name": "v1",
            "versions": {
                "v1": {
                    "description": "Unsupported runtime",
                    "input_schema": {"type": "object"},
                    "script_type": "ruby"
                }
            }
        }
    ]);
    std::fs::write(temp.path().join("tools.json"), manifest.to_string()).unwrap();
    std::fs::write(temp.path().join("rubytool-v1.sh"), "puts 'hi'\n").unwrap();

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let handler = ToolHandler::new(invoker_for(registry), vec![]);
    let result = handler
        .handle(&ToolCall {
            id: "call_1".to_string(),
            name: "rubytool".to_string(),
            arguments: ToolArguments::Parsed(serde_json::json!({})),
        })
        .await;

    assert!(result.output.is_none());
    assert_eq!(result.error.as_deref(), Some("Unsupported script type: ruby"));
}

// =============================================================================
// Environment Tests
// =============================================================================

#[tokio::test]
async fn test_prober_resolves_bash() {
    let prober = EnvironmentProber::new(false);
    let check = prober.probe("bash").await;

    assert!(check.valid);
    assert_eq!(check.executor, "bash");
}

#[tokio::test]
async fn test_force_reprobe_covers_catalog_kinds() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write_tool_folder(temp.path());

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    // bash twice in the catalog dedupes to one referenced kind
    let referenced = registry.referenced_kinds().await;
    assert_eq!(referenced, vec!["bash".to_string()]);

    let prober = EnvironmentProber::new(false);
    let results = prober.force_reprobe(&referenced).await;
    assert!(results.iter().any(|(kind, check)| kind.to_string() == "bash" && check.valid));
}

#[tokio::test]
async fn test_skip_check_trusts_defaults() {
    let prober = EnvironmentProber::new(true);
    let results = prober.probe_all().await;

    assert!(results.values().all(|c| c.valid));
}

#[tokio::test]
async fn test_executor_timeout_is_not_fatal() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let manifest = serde_json::json!([
        {
            "name": "sleeper",
            "production_version_name": "v1",
            "versions": {
                "v1": {
                    "description": "Sleeps past the timeout",
                    "input_schema": {"type": "object"},
                    "script_type": "bash"
                }
            }
        }
    ]);
    std::fs::write(temp.path().join("tools.json"), manifest.to_string()).unwrap();
    std::fs::write(temp.path().join("sleeper-v1.sh"), "sleep 10\n").unwrap();

    let registry = Arc::new(ToolRegistry::from_config(&runtime_config(temp.path())).unwrap());
    registry.initialize().await.unwrap();

    let prober = Arc::new(EnvironmentProber::new(false));
    let executor = ProcessExecutor::new(prober, Duration::from_millis(200));
    let invoker = ToolInvoker::new(registry.clone(), executor);

    let tools = registry.get_all().await;
    let result = invoker.execute(&tools["sleeper"], &serde_json::json!({})).await;

    assert!(result.error.is_none());
    assert!(result.output.unwrap().contains("timed out"));
}
