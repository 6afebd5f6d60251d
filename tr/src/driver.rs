//! Conversation driver
//!
//! Owns the message history and runs the tool-use loop: send the history,
//! execute whatever tool calls come back, feed the results in as tool
//! result blocks, and repeat until the model answers with plain text. The
//! loop is bounded by `max_turns` so a model that keeps requesting tools
//! cannot spin forever.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::invoker::ToolHandler;
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, Message};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
Use the available tools when they help answer the user's request.";

/// Result of one user turn
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Assistant text accumulated across the tool-use loop
    pub text: String,

    /// Model round-trips consumed by this turn
    pub turns: u32,

    /// Copy of the full message history after this turn
    pub history: Vec<Message>,
}

/// Drives a tool-using conversation against one model client
pub struct ConversationDriver {
    client: Arc<dyn LlmClient>,
    handler: ToolHandler,
    system_prompt: String,
    max_tokens: u32,
    max_turns: u32,
    history: Vec<Message>,
}

impl ConversationDriver {
    pub fn new(client: Arc<dyn LlmClient>, handler: ToolHandler, max_tokens: u32, max_turns: u32) -> Self {
        debug!(max_tokens, max_turns, "ConversationDriver::new: called");
        Self {
            client,
            handler,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens,
            max_turns,
            history: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Run one user turn through the tool-use loop
    ///
    /// Model failures do not tear the conversation down: the error lands in
    /// the history as assistant text and the turn returns it, so the next
    /// user turn starts from a consistent history.
    pub async fn invoke(&mut self, user_input: &str) -> ChatOutcome {
        debug!(input_len = user_input.len(), "invoke: called");
        self.history.push(Message::user(user_input));

        let mut collected: Vec<String> = Vec::new();
        let mut turns = 0;

        while turns < self.max_turns {
            turns += 1;
            let tools = self.handler.definitions().await;
            debug!(turn = turns, tool_count = tools.len(), history_len = self.history.len(), "invoke: requesting completion");

            let request = CompletionRequest {
                system_prompt: self.system_prompt.clone(),
                messages: self.history.clone(),
                tools,
                max_tokens: self.max_tokens,
            };

            let response = match self.client.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "invoke: completion failed");
                    let text = format!("LLM request failed: {}", e);
                    self.history.push(Message::assistant(text.clone()));
                    return ChatOutcome {
                        text,
                        turns,
                        history: self.history.clone(),
                    };
                }
            };

            // Mirror the assistant turn into the history, tool-use blocks
            // included, so providers see the calls their results answer
            let mut blocks: Vec<ContentBlock> = Vec::new();
            if let Some(text) = &response.content {
                if !text.is_empty() {
                    collected.push(text.clone());
                    blocks.push(ContentBlock::text(text.clone()));
                }
            }
            for call in &response.tool_calls {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.to_value_lossy(),
                });
            }
            if !blocks.is_empty() {
                self.history.push(Message::assistant_blocks(blocks));
            }

            if response.tool_calls.is_empty() {
                debug!(turn = turns, "invoke: no tool calls, turn complete");
                return ChatOutcome {
                    text: collected.join("\n\n"),
                    turns,
                    history: self.history.clone(),
                };
            }

            info!(turn = turns, call_count = response.tool_calls.len(), "invoke: executing tool calls");
            let mut results: Vec<ContentBlock> = Vec::new();
            for call in &response.tool_calls {
                let result = self.handler.handle(call).await;
                debug!(tool = %call.name, is_error = result.is_error(), "invoke: tool call finished");
                results.push(ContentBlock::tool_result(
                    call.id.clone(),
                    result.text(),
                    result.is_error(),
                ));
            }
            self.history.push(Message::user_blocks(results));
        }

        warn!(max_turns = self.max_turns, "invoke: turn limit reached");
        let notice = format!(
            "Stopped after {} turns: maximum tool-use turns exceeded.",
            self.max_turns
        );
        self.history.push(Message::assistant(notice.clone()));
        collected.push(notice);
        ChatOutcome {
            text: collected.join("\n\n"),
            turns: self.max_turns,
            history: self.history.clone(),
        }
    }

    /// Drop the accumulated history
    pub fn reset_conversation(&mut self) {
        debug!(history_len = self.history.len(), "reset_conversation: called");
        self.history.clear();
    }

    /// Snapshot of the history so far
    pub fn history(&self) -> Vec<Message> {
        self.history.clone()
    }
}
