//! ToolRelay - registry-backed tool execution for model conversations
//!
//! Tools are bash or python scripts described by a JSON Schema, loaded from
//! a local manifest folder or a remote registry API. The [`driver`] runs
//! the conversation loop, the [`invoker`] resolves and executes the model's
//! tool calls, and the [`registry`] keeps the catalog fresh.

pub mod cli;
pub mod config;
pub mod driver;
pub mod environment;
pub mod executor;
pub mod invoker;
pub mod llm;
pub mod registry;

pub use driver::{ChatOutcome, ConversationDriver};
pub use executor::{ExecutionResult, ProcessExecutor};
pub use invoker::{ToolHandler, ToolInvoker};
pub use registry::{Tool, ToolRegistry, ToolSelector};
