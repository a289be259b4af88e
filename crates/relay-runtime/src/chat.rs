use async_stream::stream;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use relay_events::SseFrame;
use relay_protocol::{EventEnvelope, RunRequest};
use serde_json::json;
use tracing::{debug, info};

use crate::driver::AgentRunDriver;

/// Encode an envelope for the wire without ever failing the stream.
pub fn envelope_frame(envelope: &EventEnvelope) -> SseFrame {
    SseFrame::from_envelope(envelope).unwrap_or_else(|error| {
        SseFrame::new(
            envelope.kind().as_str(),
            json!({ "error": error.to_string() }).to_string(),
        )
    })
}

/// Single-request, single-consumer live pipe.
///
/// Frames are produced only as the consumer polls, so a client that stops
/// reading stops the run. Dropping the stream (client gone) drops the
/// driver and with it the runtime's in-flight work.
#[derive(Clone)]
pub struct ChatSession {
    driver: AgentRunDriver,
}

impl ChatSession {
    pub fn new(driver: AgentRunDriver) -> Self {
        Self { driver }
    }

    /// One frame per envelope in emission order, then one `done` frame.
    pub fn open(&self, request: RunRequest) -> BoxStream<'static, SseFrame> {
        let mut events = self.driver.run(request);
        stream! {
            let mut watch = SessionWatch::default();
            while let Some(envelope) = events.next().await {
                watch.frames += 1;
                yield envelope_frame(&envelope);
            }
            watch.finished = true;
            yield SseFrame::done();
        }
        .boxed()
    }
}

#[derive(Default)]
struct SessionWatch {
    frames: usize,
    finished: bool,
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        if self.finished {
            debug!(frames = self.frames, "chat stream completed");
        } else {
            info!(frames = self.frames, "chat stream closed by client, run cancelled");
        }
    }
}
