//! Execution side of the relay core.
//!
//! [`AgentRunDriver`] turns one request into an ordered envelope stream with
//! exactly one terminal event. [`ChatSession`] pipes that stream straight
//! into SSE frames for a single request; [`TaskRegistry`] runs it on a
//! detached worker and republishes everything on the broadcast bus.

mod chat;
mod config;
mod driver;
mod registry;
mod summary;

pub use chat::{ChatSession, envelope_frame};
pub use config::RelayConfig;
pub use driver::{AgentRunDriver, EnvelopeStream};
pub use registry::TaskRegistry;
pub use summary::summarize_tool_result;

#[cfg(test)]
pub(crate) mod testing;
