//! Background task records and their status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::ChatTurnContext;
use crate::error::{RelayError, RelayResult};
use crate::ids::{ConversationId, ResponseId, TaskId};

/// `pending -> running -> {done, failed}`; nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The originating request payload, kept for the task's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub items: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<ResponseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

impl TaskInput {
    pub fn new(items: impl Into<String>) -> Self {
        Self {
            items: items.into(),
            previous_response_id: None,
            conversation_id: None,
        }
    }

    pub fn context(&self) -> ChatTurnContext {
        ChatTurnContext::new(
            self.conversation_id.clone(),
            self.previous_response_id.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub input: TaskInput,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(task_id: TaskId, input: TaskInput) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Pending,
            input,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Apply a status change, rejecting anything outside the state machine.
    pub fn transition(&mut self, next: TaskStatus) -> RelayResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
