//! # relay-protocol: contract crate for the relay event core
//!
//! Shared types and the single trait boundary that every other relay crate
//! depends on. Kept free of tokio and axum so it can be used by any
//! runtime adapter or client.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (TaskId, ConversationId, ResponseId, SubscriberId)
//! - [`event`]: EventEnvelope + EventKind (forward-compatible)
//! - [`context`]: ChatTurnContext, RunRequest
//! - [`task`]: TaskRecord, TaskStatus, TaskInput
//! - [`notification`]: TaskNotification (bus lifecycle messages)
//! - [`todo`]: TodoItem, TodoStatus
//! - [`ports`]: AgentRuntimePort, RuntimeEventStream
//! - [`error`]: RelayError, RelayResult

pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod notification;
pub mod ports;
pub mod task;
pub mod todo;

pub use context::{ChatTurnContext, RunRequest};
pub use error::{RelayError, RelayResult};
pub use event::{EventEnvelope, EventKind, Payload};
pub use ids::{ConversationId, ResponseId, SubscriberId, TaskId};
pub use notification::TaskNotification;
pub use ports::{AgentRuntimePort, RuntimeEventStream};
pub use task::{TaskInput, TaskRecord, TaskStatus};
pub use todo::{TodoItem, TodoStatus};
