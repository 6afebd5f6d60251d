//! Process executor for tool scripts
//!
//! Runs a tool's script in its runtime with the arguments serialized as a
//! single JSON payload. Delivery differs by runtime and must stay that way
//! for compatibility with existing tool scripts: bash reads the payload
//! from stdin, python receives it as the one positional argument. Inline
//! script source runs through the runtime's `-c` flag; a script file is
//! invoked directly.
//!
//! The executor never returns `Err`. Execution faults - missing runtime,
//! spawn failure, timeout, non-zero exit - all degrade to a textual result
//! the model can read. See [`ExecutionResult`] for the output/error split.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::environment::{EnvironmentProber, ScriptKind};
use crate::registry::Tool;

/// Cap on combined stdout/stderr kept in a result
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Outcome of one tool execution
///
/// Dual-channel contract: `output` carries success text AND execution
/// failures (environment problems, spawn faults, non-zero exits); `error`
/// is reserved for structural faults such as an unsupported script kind,
/// an unknown tool name, or unparseable arguments. Exactly one field is
/// set. Preserved for compatibility - do not route exit-code failures to
/// `error`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Textual result (including degraded failures)
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            error: None,
        }
    }

    /// Structural fault
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(text.into()),
        }
    }

    /// Whichever channel is set, as text for the model
    pub fn text(&self) -> &str {
        self.error.as_deref().or(self.output.as_deref()).unwrap_or("")
    }

    /// Whether this is a structural fault
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs tool scripts as subprocesses
pub struct ProcessExecutor {
    prober: Arc<EnvironmentProber>,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(prober: Arc<EnvironmentProber>, timeout: Duration) -> Self {
        debug!(?timeout, "ProcessExecutor::new: called");
        Self { prober, timeout }
    }

    /// Execute a tool with the given argument object and injected env map
    pub async fn execute(&self, tool: &Tool, args: &Value, env: &HashMap<String, String>) -> ExecutionResult {
        debug!(tool = %tool.name, kind = %tool.script_kind, "execute: called");

        let kind = match ScriptKind::parse(&tool.script_kind) {
            Some(k) => k,
            None => {
                debug!(kind = %tool.script_kind, "execute: unsupported script kind");
                return ExecutionResult::error(format!("Unsupported script type: {}", tool.script_kind));
            }
        };

        let check = self.prober.probe_kind(kind).await;
        if !check.valid {
            let reason = check.error.unwrap_or_else(|| format!("{} runtime unavailable", kind));
            debug!(tool = %tool.name, %reason, "execute: environment invalid");
            return ExecutionResult::output(format!("Environment error: {}", reason));
        }

        let payload = build_payload(args, env).to_string();
        debug!(tool = %tool.name, payload_len = payload.len(), executor = %check.executor, "execute: spawning");

        match self.run(kind, &check.executor, tool, &payload).await {
            Ok(output) => combine_output(tool, output),
            Err(message) => {
                debug!(tool = %tool.name, %message, "execute: subprocess fault");
                ExecutionResult::output(format!("Execution error: {}", message))
            }
        }
    }

    /// Spawn the subprocess and collect its output
    async fn run(
        &self,
        kind: ScriptKind,
        executor: &str,
        tool: &Tool,
        payload: &str,
    ) -> Result<std::process::Output, String> {
        let mut command = tokio::process::Command::new(executor);

        match &tool.script_path {
            Some(path) => {
                command.arg(path);
            }
            None => {
                command.arg("-c").arg(&tool.script);
            }
        }

        match kind {
            ScriptKind::Bash => {
                // Payload on stdin; close the pipe so the script sees EOF
                command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

                let mut child = command.spawn().map_err(|e| format!("failed to spawn {}: {}", executor, e))?;

                if let Some(mut stdin) = child.stdin.take() {
                    stdin
                        .write_all(payload.as_bytes())
                        .await
                        .map_err(|e| format!("failed to write arguments to stdin: {}", e))?;
                }

                match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(format!("failed to collect output: {}", e)),
                    Err(_) => Err(format!("command timed out after {}ms", self.timeout.as_millis())),
                }
            }
            ScriptKind::Python => {
                // Payload as the single positional argument
                command.arg(payload);

                match tokio::time::timeout(self.timeout, command.output()).await {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(format!("failed to spawn {}: {}", executor, e)),
                    Err(_) => Err(format!("command timed out after {}ms", self.timeout.as_millis())),
                }
            }
        }
    }
}

/// Merge caller arguments with the injected `openv` environment map
fn build_payload(args: &Value, env: &HashMap<String, String>) -> Value {
    let mut object = match args.as_object() {
        Some(map) => map.clone(),
        None => {
            if !args.is_null() {
                warn!("build_payload: non-object arguments dropped");
            }
            serde_json::Map::new()
        }
    };
    object.insert("openv".to_string(), serde_json::json!(env));
    Value::Object(object)
}

/// Trim, concatenate and cap the captured streams
///
/// Stdout first, blank separator, stderr if non-empty. A non-zero exit is
/// logged but still resolves through `output`.
fn combine_output(tool: &Tool, output: std::process::Output) -> ExecutionResult {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let combined = if stderr.is_empty() {
        stdout
    } else if stdout.is_empty() {
        stderr
    } else {
        format!("{}\n\n{}", stdout, stderr)
    };

    let capped = if combined.len() > MAX_OUTPUT_CHARS {
        debug!(tool = %tool.name, total = combined.len(), "combine_output: truncating");
        let mut cut = MAX_OUTPUT_CHARS;
        while !combined.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...\n[truncated, {} chars total]", &combined[..cut], combined.len())
    } else {
        combined
    };

    if !output.status.success() {
        warn!(
            tool = %tool.name,
            exit_code = output.status.code().unwrap_or(-1),
            "combine_output: tool exited non-zero"
        );
    }

    ExecutionResult::output(capped)
}
