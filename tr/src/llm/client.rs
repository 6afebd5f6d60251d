//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless model client
///
/// Each call is independent: the full history travels in the request, so
/// the conversation driver owns all state and clients can be shared freely.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Send one completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
