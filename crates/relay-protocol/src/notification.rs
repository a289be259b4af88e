//! Lifecycle notifications published on the task broadcast bus.
//!
//! These are bus-level messages about task existence and status, distinct
//! from the agent's own semantic events (which ride inside `event`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};
use crate::event::EventEnvelope;
use crate::ids::TaskId;
use crate::task::TaskStatus;

pub const TASK_CREATED: &str = "task.created";
pub const TASK_UPDATED: &str = "task.updated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskNotification {
    /// `event` is only present while `status == running`.
    Updated {
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<EventEnvelope>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Created {
        task_id: TaskId,
    },
}

impl TaskNotification {
    pub fn created(task_id: TaskId) -> Self {
        Self::Created { task_id }
    }

    pub fn running(task_id: TaskId, event: EventEnvelope) -> Self {
        Self::Updated {
            task_id,
            status: TaskStatus::Running,
            event: Some(event),
            error: None,
        }
    }

    pub fn done(task_id: TaskId) -> Self {
        Self::Updated {
            task_id,
            status: TaskStatus::Done,
            event: None,
            error: None,
        }
    }

    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self::Updated {
            task_id,
            status: TaskStatus::Failed,
            event: None,
            error: Some(error.into()),
        }
    }

    /// SSE event name on the task feed.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Created { .. } => TASK_CREATED,
            Self::Updated { .. } => TASK_UPDATED,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Created { task_id } | Self::Updated { task_id, .. } => task_id,
        }
    }

    pub fn status(&self) -> Option<TaskStatus> {
        match self {
            Self::Created { .. } => None,
            Self::Updated { status, .. } => Some(*status),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(TaskStatus::is_terminal)
    }

    /// Whether a client watching `task_id` should see this notification.
    /// Creation is global awareness and always passes.
    pub fn concerns(&self, task_id: &TaskId) -> bool {
        match self {
            Self::Created { .. } => true,
            Self::Updated { task_id: id, .. } => id == task_id,
        }
    }

    pub fn to_data(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild from a decoded SSE frame, checking the name matches the shape.
    pub fn from_frame(event: &str, data: &str) -> RelayResult<Self> {
        let value: Value = serde_json::from_str(data)?;
        let notification: Self = serde_json::from_value(value)?;
        if notification.event_name() != event {
            return Err(RelayError::InvalidRequest(format!(
                "frame named {event} carries a {} payload",
                notification.event_name()
            )));
        }
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_serializes_to_task_id_only() {
        let note = TaskNotification::created(TaskId::from_sequence(1));
        assert_eq!(note.event_name(), "task.created");
        assert_eq!(note.to_data().unwrap(), r#"{"task_id":"t-1"}"#);
    }

    #[test]
    fn done_has_no_event_field() {
        let note = TaskNotification::done(TaskId::from_sequence(1));
        assert_eq!(
            serde_json::to_value(&note).unwrap(),
            json!({"task_id": "t-1", "status": "done"})
        );
        assert!(note.is_terminal());
    }

    #[test]
    fn running_carries_the_envelope() {
        let note = TaskNotification::running(
            TaskId::from_sequence(2),
            EventEnvelope::text_delta("hi"),
        );
        assert_eq!(
            serde_json::to_value(&note).unwrap(),
            json!({
                "task_id": "t-2",
                "status": "running",
                "event": {"kind": "text-delta", "payload": {"delta": "hi"}}
            })
        );
        assert!(!note.is_terminal());
    }

    #[test]
    fn frames_decode_back_into_notifications() {
        let created = TaskNotification::from_frame("task.created", r#"{"task_id":"t-9"}"#).unwrap();
        assert_eq!(created, TaskNotification::created(TaskId::from_sequence(9)));

        let failed = TaskNotification::from_frame(
            "task.updated",
            r#"{"task_id":"t-9","status":"failed","error":"boom"}"#,
        )
        .unwrap();
        assert_eq!(failed, TaskNotification::failed(TaskId::from_sequence(9), "boom"));

        assert!(TaskNotification::from_frame("task.updated", r#"{"task_id":"t-9"}"#).is_err());
    }

    #[test]
    fn filter_passes_creation_for_every_task() {
        let watched = TaskId::from_sequence(1);
        let other = TaskId::from_sequence(2);
        assert!(TaskNotification::created(other.clone()).concerns(&watched));
        assert!(!TaskNotification::done(other).concerns(&watched));
        assert!(TaskNotification::done(watched.clone()).concerns(&watched));
    }
}
