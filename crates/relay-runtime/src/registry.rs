use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use parking_lot::Mutex;
use relay_events::{BroadcastBus, Subscription};
use relay_protocol::{
    EventKind, RelayError, RelayResult, RunRequest, TaskId, TaskInput, TaskNotification,
    TaskRecord, TaskStatus,
};
use tracing::{debug, error, info, instrument, warn};

use crate::driver::AgentRunDriver;

const PANIC_DETAIL: &str = "task worker panicked";
const CANCELLED_DETAIL: &str = "task worker cancelled";

#[derive(Debug, Default)]
struct RegistryState {
    records: HashMap<TaskId, TaskRecord>,
    /// Creation order, oldest first.
    order: VecDeque<TaskId>,
}

impl RegistryState {
    fn insert(&mut self, record: TaskRecord, capacity: usize) {
        self.order.push_back(record.task_id.clone());
        self.records.insert(record.task_id.clone(), record);

        while self.records.len() > capacity {
            let oldest_finished = self.order.iter().position(|id| {
                self.records
                    .get(id)
                    .is_some_and(|record| record.status.is_terminal())
            });
            let Some(index) = oldest_finished else {
                break;
            };
            if let Some(evicted) = self.order.remove(index) {
                self.records.remove(&evicted);
                debug!(task_id = %evicted, "evicted finished task");
            }
        }
    }

    fn transition(
        &mut self,
        task_id: &TaskId,
        next: TaskStatus,
        error: Option<String>,
    ) -> RelayResult<()> {
        let record = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| RelayError::TaskNotFound(task_id.to_string()))?;
        // a worker that dies before starting still has to reach `failed`
        if next == TaskStatus::Failed && record.status == TaskStatus::Pending {
            record.transition(TaskStatus::Running)?;
        }
        record.transition(next)?;
        record.error = error;
        Ok(())
    }
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    driver: AgentRunDriver,
    bus: BroadcastBus<TaskNotification>,
    capacity: usize,
    next_id: AtomicU64,
}

/// Owns every background task and the broadcast feed that reports on them.
///
/// `create` returns at once; the run happens on a detached tokio task whose
/// failures (including panics) are contained and reported as `failed`.
/// Subscribers are passive: disconnecting never affects a run.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    pub fn new(
        driver: AgentRunDriver,
        bus: BroadcastBus<TaskNotification>,
        capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
                driver,
                bus,
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a task, announce it, and schedule its run.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self, input), fields(input_len = input.items.len()))]
    pub fn create(&self, input: TaskInput) -> TaskId {
        let task_id = TaskId::from_sequence(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let record = TaskRecord::new(task_id.clone(), input.clone());
        let report = {
            let mut state = self.inner.state.lock();
            state.insert(record, self.inner.capacity);
            self.inner
                .bus
                .publish(TaskNotification::created(task_id.clone()))
        };
        info!(task_id = %task_id, subscribers = report.delivered, "task created");

        tokio::spawn(self.clone().supervise(task_id.clone(), input));
        task_id
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.inner.state.lock().records.get(task_id).cloned()
    }

    /// All retained tasks, newest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> Subscription<TaskNotification> {
        self.inner.bus.subscribe()
    }

    pub fn bus(&self) -> &BroadcastBus<TaskNotification> {
        &self.inner.bus
    }

    async fn supervise(self, task_id: TaskId, input: TaskInput) {
        let worker = tokio::spawn(self.clone().execute(task_id.clone(), input));
        match worker.await {
            Ok(()) => {}
            Err(join_error) => {
                let detail = if join_error.is_panic() {
                    PANIC_DETAIL
                } else {
                    CANCELLED_DETAIL
                };
                error!(task_id = %task_id, %join_error, "task worker aborted");
                self.finish(&task_id, TaskStatus::Failed, Some(detail.to_owned()));
            }
        }
    }

    #[instrument(skip_all, fields(task_id = %task_id))]
    async fn execute(self, task_id: TaskId, input: TaskInput) {
        let started = self
            .inner
            .state
            .lock()
            .transition(&task_id, TaskStatus::Running, None);
        if let Err(error) = started {
            warn!(%error, "task could not start");
            return;
        }
        debug!("task running");

        let request = RunRequest::task(task_id.clone(), input.items.clone(), input.context());
        let mut events = self.inner.driver.run(request);
        let mut failure = None;
        while let Some(envelope) = events.next().await {
            if envelope.kind() == &EventKind::RunFailed {
                let message = envelope
                    .get_str("message")
                    .unwrap_or("agent run failed")
                    .to_owned();
                failure = Some(message);
                break;
            }
            self.inner
                .bus
                .publish(TaskNotification::running(task_id.clone(), envelope));
        }

        match failure {
            None => self.finish(&task_id, TaskStatus::Done, None),
            Some(message) => self.finish(&task_id, TaskStatus::Failed, Some(message)),
        }
    }

    /// Status change and its notification happen under one lock.
    fn finish(&self, task_id: &TaskId, status: TaskStatus, error: Option<String>) {
        let mut state = self.inner.state.lock();
        if let Err(error) = state.transition(task_id, status, error.clone()) {
            warn!(task_id = %task_id, %error, "ignoring terminal transition");
            return;
        }

        let notification = match error {
            Some(detail) => TaskNotification::failed(task_id.clone(), detail),
            None => TaskNotification::done(task_id.clone()),
        };
        self.inner.bus.publish(notification);
        drop(state);
        info!(task_id = %task_id, status = %status, "task finished");
    }
}
