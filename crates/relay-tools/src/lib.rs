//! A self-contained agent runtime for demos and local development.
//!
//! [`DemoAgentRuntime`] plans tool calls from keywords in the request,
//! tracks them on a todo list, runs them against in-memory mock data and
//! streams a short answer. It implements the same
//! [`relay_protocol::AgentRuntimePort`] an LLM-backed runtime would.

mod runtime;
mod todos;
mod tools;

pub use runtime::DemoAgentRuntime;
pub use todos::TodoList;
pub use tools::{ToolCall, ToolDefinition, ToolDispatcher, ToolKind, ToolRegistry};
