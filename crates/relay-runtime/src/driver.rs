use std::sync::Arc;

use async_stream::stream;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use relay_protocol::{AgentRuntimePort, ConversationId, EventEnvelope, EventKind, RunRequest};
use tracing::{debug, info, warn};

use crate::summary::summarize_tool_result;

pub type EnvelopeStream = BoxStream<'static, EventEnvelope>;

/// Invokes the agent runtime once per call and forwards what it emits.
///
/// The returned stream is lazy, keeps the runtime's order, and always ends
/// with exactly one terminal envelope (`turn-completed` or `run-failed`).
/// Runtime faults never escape as errors; they become `run-failed`.
/// Dropping the stream drops the runtime's stream with it.
#[derive(Clone)]
pub struct AgentRunDriver {
    runtime: Arc<dyn AgentRuntimePort>,
}

impl AgentRunDriver {
    pub fn new(runtime: Arc<dyn AgentRuntimePort>) -> Self {
        Self { runtime }
    }

    pub fn run(&self, request: RunRequest) -> EnvelopeStream {
        let runtime = Arc::clone(&self.runtime);
        let task_id = request.task_id.clone();
        let mut conversation_id: Option<ConversationId> = request.context.conversation_id.clone();

        stream! {
            debug!(task_id = ?task_id, input_len = request.input.len(), "agent run starting");
            let mut events = match runtime.start(request).await {
                Ok(events) => events,
                Err(error) => {
                    warn!(task_id = ?task_id, %error, "agent runtime failed to start");
                    yield EventEnvelope::run_failed(error.to_string());
                    return;
                }
            };

            let mut forwarded = 0_usize;
            loop {
                match events.next().await {
                    Some(Ok(envelope)) => {
                        forwarded += 1;
                        match envelope.kind() {
                            EventKind::ConversationEstablished => {
                                if let Some(id) = envelope.get_str("conversation_id") {
                                    conversation_id = Some(ConversationId::from_string(id));
                                }
                            }
                            EventKind::ToolResult => {
                                let name = envelope.get_str("name").unwrap_or("tool").to_owned();
                                let result = envelope.get("result").cloned().unwrap_or_default();
                                info!(task_id = ?task_id, tool = %name, result = %result, "tool result");
                                yield envelope;
                                let text = summarize_tool_result(&name, &result);
                                yield EventEnvelope::synthesized_summary(name, text);
                                continue;
                            }
                            _ => {}
                        }

                        let terminal = envelope.is_terminal();
                        yield envelope;
                        if terminal {
                            debug!(task_id = ?task_id, forwarded, "agent run finished");
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(task_id = ?task_id, %error, forwarded, "agent run failed");
                        yield EventEnvelope::run_failed(error.to_string());
                        return;
                    }
                    None => {
                        debug!(task_id = ?task_id, forwarded, "runtime ended without terminal event");
                        yield EventEnvelope::turn_completed(None, conversation_id.as_ref());
                        return;
                    }
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRuntime, Step};
    use anyhow::Result;
    use relay_protocol::{ChatTurnContext, ResponseId};
    use serde_json::json;

    fn kinds(events: &[EventEnvelope]) -> Vec<&str> {
        events.iter().map(|event| event.kind().as_str()).collect()
    }

    #[tokio::test]
    async fn forwards_events_in_order_and_stops_at_terminal() -> Result<()> {
        let runtime = Arc::new(ScriptedRuntime::emitting([
            EventEnvelope::text_delta("a"),
            EventEnvelope::text_delta("b"),
            EventEnvelope::turn_completed(Some(&ResponseId::from_string("resp_1")), None),
            EventEnvelope::text_delta("never"),
        ]));
        let driver = AgentRunDriver::new(runtime.clone());

        let events: Vec<_> = driver
            .run(RunRequest::chat("hi", ChatTurnContext::default()))
            .collect()
            .await;

        assert_eq!(kinds(&events), vec!["text-delta", "text-delta", "turn-completed"]);
        assert_eq!(events[0].get_str("delta"), Some("a"));
        assert_eq!(events[2].get_str("response_id"), Some("resp_1"));
        assert_eq!(runtime.starts.load(std::sync::atomic::Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn appends_completion_when_runtime_just_ends() -> Result<()> {
        let runtime = Arc::new(ScriptedRuntime::emitting([
            EventEnvelope::conversation_established(&ConversationId::from_string("conv_9")),
            EventEnvelope::text_done("ok"),
        ]));
        let driver = AgentRunDriver::new(runtime);

        let events: Vec<_> = driver
            .run(RunRequest::chat("hi", ChatTurnContext::default()))
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec!["conversation-established", "text-done", "turn-completed"]
        );
        assert_eq!(events[2].get_str("conversation_id"), Some("conv_9"));
        Ok(())
    }

    #[tokio::test]
    async fn runtime_error_becomes_single_failure_terminal() -> Result<()> {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            Step::Emit(EventEnvelope::text_delta("partial")),
            Step::Fail("model backend unavailable".to_owned()),
            Step::Emit(EventEnvelope::text_delta("never")),
        ]));
        let driver = AgentRunDriver::new(runtime);

        let events: Vec<_> = driver
            .run(RunRequest::chat("hi", ChatTurnContext::default()))
            .collect()
            .await;

        assert_eq!(kinds(&events), vec!["text-delta", "run-failed"]);
        assert_eq!(
            events[1].get_str("message"),
            Some("runtime error: model backend unavailable")
        );
        Ok(())
    }

    #[tokio::test]
    async fn start_failure_is_reported_as_terminal_event() -> Result<()> {
        let driver = AgentRunDriver::new(Arc::new(ScriptedRuntime::failing_to_start("no key")));
        let events: Vec<_> = driver
            .run(RunRequest::chat("hi", ChatTurnContext::default()))
            .collect()
            .await;
        assert_eq!(kinds(&events), vec!["run-failed"]);
        Ok(())
    }

    #[tokio::test]
    async fn tool_results_are_followed_by_a_summary() -> Result<()> {
        let runtime = Arc::new(ScriptedRuntime::emitting([
            EventEnvelope::tool_result("get_emails", json!([{"subject": "Q3"}])),
            EventEnvelope::text_done("done"),
        ]));
        let driver = AgentRunDriver::new(runtime);

        let events: Vec<_> = driver
            .run(RunRequest::chat("mail", ChatTurnContext::default()))
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec!["tool-result", "synthesized-summary", "text-done", "turn-completed"]
        );
        assert_eq!(events[1].get_str("name"), Some("get_emails"));
        assert_eq!(events[1].get_str("text"), Some("Found 1 email. Subjects: Q3."));
        Ok(())
    }

    #[tokio::test]
    async fn run_is_lazy_until_polled() -> Result<()> {
        let runtime = Arc::new(ScriptedRuntime::emitting([EventEnvelope::text_done("x")]));
        let driver = AgentRunDriver::new(runtime.clone());
        let stream = driver.run(RunRequest::chat("hi", ChatTurnContext::default()));
        assert_eq!(runtime.starts.load(std::sync::atomic::Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(runtime.starts.load(std::sync::atomic::Ordering::SeqCst), 0);
        Ok(())
    }
}
