use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-subscriber queue bound on the task feed.
    pub subscriber_capacity: usize,
    /// Task records kept before the oldest finished ones are evicted.
    pub task_capacity: usize,
    pub keep_alive: Duration,
    /// Artificial pause between demo runtime steps.
    pub step_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            task_capacity: 1024,
            keep_alive: Duration::from_secs(15),
            step_delay: Duration::ZERO,
        }
    }
}

impl RelayConfig {
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    pub fn task_capacity(mut self, capacity: usize) -> Self {
        self.task_capacity = capacity.max(1);
        self
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}
