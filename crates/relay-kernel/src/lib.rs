use std::sync::Arc;

use futures_util::stream::BoxStream;
use relay_events::{BroadcastBus, SseFrame, Subscription};
use relay_protocol::{
    AgentRuntimePort, ChatTurnContext, RelayError, RelayResult, RunRequest, TaskId, TaskInput,
    TaskNotification, TaskRecord,
};
use relay_runtime::{AgentRunDriver, ChatSession, TaskRegistry};
use relay_tools::DemoAgentRuntime;
use tracing::{info, instrument};

pub use relay_runtime::RelayConfig;

#[derive(Clone, Default)]
pub struct RelayBuilder {
    config: RelayConfig,
    runtime: Option<Arc<dyn AgentRuntimePort>>,
}

impl RelayBuilder {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            runtime: None,
        }
    }

    /// Replace the built-in demo runtime.
    pub fn runtime(mut self, runtime: Arc<dyn AgentRuntimePort>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Relay {
        let runtime = self.runtime.unwrap_or_else(|| {
            Arc::new(DemoAgentRuntime::default().with_step_delay(self.config.step_delay))
        });
        let driver = AgentRunDriver::new(runtime);
        let bus = BroadcastBus::new(self.config.subscriber_capacity);
        let tasks = TaskRegistry::new(driver.clone(), bus.clone(), self.config.task_capacity);

        Relay {
            config: self.config,
            chat: ChatSession::new(driver),
            tasks,
            bus,
        }
    }
}

/// Entry point for both delivery paths: per-request chat streams and the
/// shared task feed.
#[derive(Clone)]
pub struct Relay {
    config: RelayConfig,
    chat: ChatSession,
    tasks: TaskRegistry,
    bus: BroadcastBus<TaskNotification>,
}

impl Relay {
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[instrument(skip_all)]
    pub fn chat(
        &self,
        input: impl Into<String>,
        context: ChatTurnContext,
    ) -> RelayResult<BoxStream<'static, SseFrame>> {
        let input = input.into();
        ensure_input(&input)?;
        Ok(self.chat.open(RunRequest::chat(input, context)))
    }

    /// Register a background task. Must be called from within a tokio runtime.
    pub fn create_task(&self, input: TaskInput) -> RelayResult<TaskId> {
        ensure_input(&input.items)?;
        if self.bus.is_closed() {
            return Err(RelayError::BusClosed);
        }
        Ok(self.tasks.create(input))
    }

    pub fn task(&self, task_id: &TaskId) -> RelayResult<TaskRecord> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| RelayError::TaskNotFound(task_id.to_string()))
    }

    /// Retained tasks, newest first.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks.list()
    }

    pub fn subscribe(&self) -> Subscription<TaskNotification> {
        self.bus.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    /// Ends every feed subscription. Running tasks finish unobserved.
    pub fn shutdown(&self) {
        info!(subscribers = self.bus.subscriber_count(), "shutting down task feed");
        self.bus.shutdown();
    }
}

fn ensure_input(input: &str) -> RelayResult<()> {
    if input.trim().is_empty() {
        return Err(RelayError::InvalidRequest("input must not be empty".to_owned()));
    }
    Ok(())
}
