//! Per-run input handed to the agent runtime.

use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, ResponseId, TaskId};

/// Continuation ids a chat client echoes back on later turns.
///
/// Lives for one request only; continuity is entirely client-driven.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurnContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<ResponseId>,
}

impl ChatTurnContext {
    pub fn new(
        conversation_id: Option<ConversationId>,
        previous_response_id: Option<ResponseId>,
    ) -> Self {
        Self {
            conversation_id,
            previous_response_id,
        }
    }
}

/// One unit of work for the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub input: String,
    #[serde(default)]
    pub context: ChatTurnContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl RunRequest {
    pub fn chat(input: impl Into<String>, context: ChatTurnContext) -> Self {
        Self {
            input: input.into(),
            context,
            task_id: None,
        }
    }

    pub fn task(task_id: TaskId, input: impl Into<String>, context: ChatTurnContext) -> Self {
        Self {
            input: input.into(),
            context,
            task_id: Some(task_id),
        }
    }
}
