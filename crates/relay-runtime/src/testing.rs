//! Scripted agent runtime for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use relay_protocol::{
    AgentRuntimePort, EventEnvelope, RelayError, RelayResult, RunRequest, RuntimeEventStream,
};
use tokio::sync::Notify;

#[derive(Clone)]
pub(crate) enum Step {
    Emit(EventEnvelope),
    Fail(String),
    Panic,
    Gate(Arc<Notify>),
}

#[derive(Default)]
pub(crate) struct ScriptedRuntime {
    steps: Vec<Step>,
    start_error: Option<String>,
    pub(crate) starts: AtomicUsize,
    pub(crate) requests: parking_lot::Mutex<Vec<RunRequest>>,
    pub(crate) dropped: Arc<AtomicBool>,
}

impl ScriptedRuntime {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub(crate) fn emitting(events: impl IntoIterator<Item = EventEnvelope>) -> Self {
        Self::new(events.into_iter().map(Step::Emit).collect())
    }

    pub(crate) fn failing_to_start(message: &str) -> Self {
        Self {
            start_error: Some(message.to_owned()),
            ..Self::default()
        }
    }

    pub(crate) fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentRuntimePort for ScriptedRuntime {
    async fn start(&self, request: RunRequest) -> RelayResult<RuntimeEventStream> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        if let Some(message) = &self.start_error {
            return Err(RelayError::runtime(message.clone()));
        }

        let steps = self.steps.clone();
        let dropped = Arc::clone(&self.dropped);
        Ok(stream! {
            let _flag = DropFlag(dropped);
            for step in steps {
                match step {
                    Step::Emit(envelope) => yield Ok(envelope),
                    Step::Fail(message) => {
                        yield Err(RelayError::runtime(message));
                        return;
                    }
                    Step::Panic => panic!("scripted runtime panic"),
                    Step::Gate(gate) => gate.notified().await,
                }
            }
        }
        .boxed())
    }
}
