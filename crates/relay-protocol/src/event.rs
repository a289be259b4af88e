//! The event envelope every agent runtime event is mapped onto.
//!
//! Forward-compatible: unknown kind labels deserialize into
//! `EventKind::Other` instead of failing, and the payload is a free-form
//! JSON object so no runtime field is lost in translation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Kind-specific payload: a JSON object with unique keys.
pub type Payload = Map<String, Value>;

/// Discriminated tag identifying the semantic event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    ConversationEstablished,
    TextDelta,
    TextDone,
    ToolResult,
    TodoAdded,
    TodoStatusChanged,
    SynthesizedSummary,
    TurnCompleted,
    RunFailed,
    Other(String),
}

impl EventKind {
    /// Wire label, also used as the SSE event name on the chat stream.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConversationEstablished => "conversation-established",
            Self::TextDelta => "text-delta",
            Self::TextDone => "text-done",
            Self::ToolResult => "tool-result",
            Self::TodoAdded => "todo-added",
            Self::TodoStatusChanged => "todo-status-changed",
            Self::SynthesizedSummary => "synthesized-summary",
            Self::TurnCompleted => "turn-completed",
            Self::RunFailed => "run-failed",
            Self::Other(label) => label,
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "conversation-established" => Self::ConversationEstablished,
            "text-delta" => Self::TextDelta,
            "text-done" => Self::TextDone,
            "tool-result" => Self::ToolResult,
            "todo-added" => Self::TodoAdded,
            "todo-status-changed" => Self::TodoStatusChanged,
            "synthesized-summary" => Self::SynthesizedSummary,
            "turn-completed" => Self::TurnCompleted,
            "run-failed" => Self::RunFailed,
            // a label is written as one SSE `event:` line
            other => Self::Other(other.replace(['\r', '\n'], "_")),
        }
    }

    /// Terminal kinds end a run: exactly one per driver invocation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TurnCompleted | Self::RunFailed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::parse(&label))
    }
}

/// Uniform wrapper for one semantic event from the agent runtime.
///
/// Immutable once built; clone it to share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    kind: EventKind,
    #[serde(default)]
    payload: Payload,
}

impl EventEnvelope {
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    /// Build from any JSON value. Objects are kept as-is; anything else is
    /// wrapped under a `value` key so it survives.
    pub fn from_value(kind: EventKind, value: Value) -> Self {
        let payload = match value {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                let mut map = Payload::new();
                map.insert("value".to_owned(), other);
                map
            }
        };
        Self { kind, payload }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    pub fn into_parts(self) -> (EventKind, Payload) {
        (self.kind, self.payload)
    }

    // ── Constructors for the known kinds ──

    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self::with_fields(EventKind::TextDelta, [("delta", Value::from(delta.into()))])
    }

    pub fn text_done(text: impl Into<String>) -> Self {
        Self::with_fields(EventKind::TextDone, [("text", Value::from(text.into()))])
    }

    pub fn tool_result(name: impl Into<String>, result: Value) -> Self {
        Self::with_fields(
            EventKind::ToolResult,
            [("name", Value::from(name.into())), ("result", result)],
        )
    }

    pub fn synthesized_summary(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_fields(
            EventKind::SynthesizedSummary,
            [
                ("name", Value::from(name.into())),
                ("text", Value::from(text.into())),
            ],
        )
    }

    pub fn conversation_established(conversation_id: &crate::ConversationId) -> Self {
        Self::with_fields(
            EventKind::ConversationEstablished,
            [("conversation_id", Value::from(conversation_id.as_str()))],
        )
    }

    pub fn turn_completed(
        response_id: Option<&crate::ResponseId>,
        conversation_id: Option<&crate::ConversationId>,
    ) -> Self {
        let mut payload = Payload::new();
        if let Some(response_id) = response_id {
            payload.insert("response_id".to_owned(), response_id.as_str().into());
        }
        if let Some(conversation_id) = conversation_id {
            payload.insert("conversation_id".to_owned(), conversation_id.as_str().into());
        }
        Self::new(EventKind::TurnCompleted, payload)
    }

    pub fn run_failed(message: impl Into<String>) -> Self {
        Self::with_fields(EventKind::RunFailed, [("message", Value::from(message.into()))])
    }

    fn with_fields<const N: usize>(kind: EventKind, fields: [(&str, Value); N]) -> Self {
        let payload = fields
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect();
        Self { kind, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_labels_round_trip() {
        for kind in [
            EventKind::ConversationEstablished,
            EventKind::TextDelta,
            EventKind::TextDone,
            EventKind::ToolResult,
            EventKind::TodoAdded,
            EventKind::TodoStatusChanged,
            EventKind::SynthesizedSummary,
            EventKind::TurnCompleted,
            EventKind::RunFailed,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let envelope: EventEnvelope =
            serde_json::from_value(json!({"kind": "response.reasoning", "payload": {"x": 1}}))
                .unwrap();
        assert_eq!(
            envelope.kind(),
            &EventKind::Other("response.reasoning".to_owned())
        );
        let back = serde_json::to_value(&envelope).unwrap();
        assert_eq!(back, json!({"kind": "response.reasoning", "payload": {"x": 1}}));
    }

    #[test]
    fn parsed_labels_never_contain_line_breaks() {
        assert_eq!(
            EventKind::parse("x\r\nevent: done"),
            EventKind::Other("x__event: done".to_owned())
        );
    }

    #[test]
    fn only_completion_and_failure_are_terminal() {
        assert!(EventEnvelope::turn_completed(None, None).is_terminal());
        assert!(EventEnvelope::run_failed("boom").is_terminal());
        assert!(!EventEnvelope::text_delta("hi").is_terminal());
        assert!(!EventKind::Other("turn-completed-ish".into()).is_terminal());
    }

    #[test]
    fn non_object_values_are_wrapped() {
        let envelope = EventEnvelope::from_value(EventKind::ToolResult, json!([1, 2]));
        assert_eq!(envelope.get("value"), Some(&json!([1, 2])));
        let empty = EventEnvelope::from_value(EventKind::TextDone, Value::Null);
        assert!(empty.payload().is_empty());
    }

    #[test]
    fn tool_result_keeps_every_field() {
        let envelope = EventEnvelope::tool_result("get_weather", json!({"city": "Oslo"}));
        assert_eq!(envelope.get_str("name"), Some("get_weather"));
        assert_eq!(envelope.get("result"), Some(&json!({"city": "Oslo"})));
    }
}
