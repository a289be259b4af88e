use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use relay_protocol::SubscriberId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Outcome of one [`BroadcastBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug)]
struct BusInner<T> {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    closed: AtomicBool,
}

/// Live fan-out hub: every published item goes to every current subscriber.
///
/// Each subscriber owns a bounded queue. Publishing never waits: a full
/// queue drops that subscriber and a closed one is pruned, so one slow or
/// vanished consumer cannot stall the others.
#[derive(Debug)]
pub struct BroadcastBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for BroadcastBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> BroadcastBus<T> {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity: queue_capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn publish(&self, item: T) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|id, sender| match sender.try_send(item.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "subscriber queue full, dropping subscriber");
                report.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "pruning closed subscriber");
                report.dropped += 1;
                false
            }
        });
        report
    }

    /// Attach a new live tap. Nothing published before this call is seen.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        {
            // the closed flag only changes under this lock
            let mut subscribers = self.inner.subscribers.lock();
            if self.inner.closed.load(Ordering::Acquire) {
                debug!(subscriber = %id, "subscribe after shutdown");
            } else {
                subscribers.insert(id, sender);
                debug!(subscriber = %id, "subscriber attached");
            }
        }
        Subscription {
            id,
            receiver: ReceiverStream::new(receiver),
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Close every subscriber; their streams end after draining.
    pub fn shutdown(&self) {
        let dropped = {
            let mut subscribers = self.inner.subscribers.lock();
            self.inner.closed.store(true, Ordering::Release);
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        debug!(dropped, "broadcast bus shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// One subscriber's receiving end. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriberId,
    receiver: ReceiverStream<T>,
    bus: Weak<BusInner<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.next().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade()
            && bus.subscribers.lock().remove(&self.id).is_some()
        {
            debug!(subscriber = %self.id, "subscriber detached");
        }
    }
}
