use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use relay_protocol::{
    AgentRuntimePort, ConversationId, EventEnvelope, RelayError, RelayResult, ResponseId,
    RunRequest, RuntimeEventStream, TodoStatus,
};
use tracing::{debug, info, instrument, warn};

use crate::todos::TodoList;
use crate::tools::{ToolDispatcher, ToolRegistry};

/// Scripted agent: one todo and one tool call per matched tool, then a
/// streamed answer.
#[derive(Debug, Clone)]
pub struct DemoAgentRuntime {
    dispatcher: Arc<ToolDispatcher>,
    step_delay: Duration,
}

impl Default for DemoAgentRuntime {
    fn default() -> Self {
        Self::new(ToolRegistry::with_demo_tools())
    }
}

impl DemoAgentRuntime {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(registry)),
            step_delay: Duration::ZERO,
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn compose_answer(input: &str, tools: &[String]) -> String {
    match tools {
        [] => format!("No tools were needed. You said: {input}"),
        [only] => format!("Done. I used {only} to handle your request."),
        [init @ .., last] => format!(
            "Done. I used {} and {last} to handle your request.",
            init.join(", ")
        ),
    }
}

#[async_trait]
impl AgentRuntimePort for DemoAgentRuntime {
    #[instrument(skip_all, fields(task_id = ?request.task_id))]
    async fn start(&self, request: RunRequest) -> RelayResult<RuntimeEventStream> {
        if request.input.trim().is_empty() {
            return Err(RelayError::InvalidRequest("input must not be empty".to_owned()));
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let delay = self.step_delay;
        let calls = dispatcher.plan(&request.input);
        debug!(planned = calls.len(), "planned demo run");

        Ok(stream! {
            let RunRequest { input, context, .. } = request;
            let conversation_id = match context.conversation_id {
                Some(id) => id,
                None => {
                    let id = ConversationId::new_uuid();
                    yield Ok(EventEnvelope::conversation_established(&id));
                    id
                }
            };

            let mut todos = TodoList::default();
            let mut planned = Vec::with_capacity(calls.len());
            for call in calls {
                let item = todos.add(format!("Call {}", call.name));
                yield Ok(item.added_event());
                planned.push((item.id, call));
            }
            pause(delay).await;

            let mut used = Vec::new();
            for (todo_id, call) in planned {
                if let Some(item) = todos.set_status(todo_id, TodoStatus::Running) {
                    yield Ok(item.status_event());
                }
                pause(delay).await;

                match dispatcher.dispatch(&call) {
                    Ok(result) => {
                        info!(tool = %call.name, "mock tool finished");
                        yield Ok(EventEnvelope::tool_result(call.name.clone(), result));
                    }
                    Err(err) => {
                        warn!(tool = %call.name, error = %err, "mock tool failed");
                        yield Err(RelayError::runtime(format!("{}: {err:#}", call.name)));
                        return;
                    }
                }

                if let Some(item) = todos.set_status(todo_id, TodoStatus::Done) {
                    yield Ok(item.status_event());
                }
                used.push(call.name);
            }

            let answer = compose_answer(&input, &used);
            for chunk in answer.split_inclusive(' ') {
                yield Ok(EventEnvelope::text_delta(chunk));
                pause(delay).await;
            }
            yield Ok(EventEnvelope::text_done(answer.clone()));
            yield Ok(EventEnvelope::turn_completed(
                Some(&ResponseId::new_uuid()),
                Some(&conversation_id),
            ));
        }
        .boxed())
    }
}
