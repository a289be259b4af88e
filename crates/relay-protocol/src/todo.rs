//! Todo items surfaced by the agent's planning tools.
//!
//! The relay core never owns todo state; it only relays the add and
//! status-change events in the order the runtime emits them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{EventEnvelope, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u32,
    pub text: String,
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            status: TodoStatus::Idle,
        }
    }

    pub fn added_event(&self) -> EventEnvelope {
        EventEnvelope::from_value(EventKind::TodoAdded, self.to_value())
    }

    pub fn status_event(&self) -> EventEnvelope {
        EventEnvelope::from_value(EventKind::TodoStatusChanged, self.to_value())
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
