use relay_protocol::{EventEnvelope, EventKind, Payload, RelayError, RelayResult, TaskNotification};

/// Event name of the terminal frame that closes a chat stream.
pub const DONE_EVENT: &str = "done";

const DEFAULT_EVENT: &str = "message";

/// One `text/event-stream` frame: an event label plus its data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

impl SseFrame {
    /// Line breaks in the event name would split the frame, so they are
    /// replaced with `_`.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        let mut event = event.into();
        if event.contains(['\r', '\n']) {
            event = event.replace(['\r', '\n'], "_");
        }
        Self {
            event,
            data: data.into(),
        }
    }

    /// Chat stream frame: event name is the envelope kind, data the payload.
    pub fn from_envelope(envelope: &EventEnvelope) -> RelayResult<Self> {
        let data = serde_json::to_string(envelope.payload())?;
        Ok(Self::new(envelope.kind().as_str(), data))
    }

    pub fn from_notification(notification: &TaskNotification) -> RelayResult<Self> {
        Ok(Self::new(notification.event_name(), notification.to_data()?))
    }

    /// Framing-layer end-of-stream marker; carries no envelope.
    ///
    /// Data is `{}` rather than empty: a frame without a `data:` line is
    /// never dispatched by EventSource clients.
    pub fn done() -> Self {
        Self::new(DONE_EVENT, "{}")
    }

    pub fn is_done(&self) -> bool {
        self.event == DONE_EVENT
    }

    /// Reverse of [`SseFrame::from_envelope`].
    pub fn to_envelope(&self) -> RelayResult<EventEnvelope> {
        if self.is_done() {
            return Err(RelayError::InvalidRequest(
                "done frame carries no envelope".to_owned(),
            ));
        }
        let payload: Payload = if self.data.is_empty() {
            Payload::new()
        } else {
            serde_json::from_str(&self.data)?
        };
        Ok(EventEnvelope::new(EventKind::parse(&self.event), payload))
    }

    pub fn to_notification(&self) -> RelayResult<TaskNotification> {
        TaskNotification::from_frame(&self.event, &self.data)
    }

    /// Serialize to wire bytes. Multi-line data becomes one `data:` line per
    /// line; the frame ends with a blank line.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.event.len() + self.data.len() + 16);
        out.push_str("event: ");
        out.push_str(&self.event);
        out.push('\n');
        for line in self.data.split('\n') {
            if line.is_empty() {
                out.push_str("data:\n");
            } else {
                out.push_str("data: ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }
}

/// Comment frame for idle connections; decoders ignore it.
pub fn keep_alive_comment() -> &'static str {
    ": keep-alive\n\n"
}

/// Incremental `text/event-stream` parser.
///
/// Accepts arbitrary byte chunks (split anywhere, including inside a UTF-8
/// sequence) and yields complete frames as blank lines arrive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.process_line(line.trim_end_matches('\r'));
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            },
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = self.data.take()?;
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_owned()),
            data,
        })
    }
}
