//! The runtime boundary between the relay core and an agent runtime.
//!
//! The agent runtime is an opaque capability: given a request it produces a
//! lazy, ordered, finite stream of envelopes. Any conforming implementation
//! (scripted demo, LLM-backed, test double) can sit behind this trait.
//!
//! Object-safety note:
//! - The trait uses `async-trait` for async dyn-dispatch.
//! - Streaming uses boxed trait objects (`RuntimeEventStream`).

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::context::RunRequest;
use crate::error::RelayResult;
use crate::event::EventEnvelope;

pub type RuntimeEventStream = BoxStream<'static, RelayResult<EventEnvelope>>;

#[async_trait]
pub trait AgentRuntimePort: Send + Sync {
    /// Start one run. Dropping the returned stream must cancel the run and
    /// release whatever it holds.
    async fn start(&self, request: RunRequest) -> RelayResult<RuntimeEventStream>;
}
