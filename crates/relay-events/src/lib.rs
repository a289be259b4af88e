//! Wire framing and live fan-out for relay events.
//!
//! - [`sse`] encodes envelopes and notifications into `text/event-stream`
//!   frames and decodes them back.
//! - [`bus`] is the multi-producer, multi-consumer live tap used by the
//!   task feed. No replay: subscribers only see what is published after
//!   they subscribe.

pub mod bus;
pub mod sse;

pub use bus::{BroadcastBus, PublishReport, Subscription};
pub use sse::{DONE_EVENT, SseDecoder, SseFrame, keep_alive_comment};
