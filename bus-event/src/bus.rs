//! In-process pub/sub event bus (spec component 4.H).
//!
//! `subscribe()` returns a bounded FIFO (default capacity 128). `publish`
//! assigns a monotonic event id under a mutex and broadcasts to every
//! current subscriber; on a full queue it drops the oldest element and
//! retries once; if the queue is still full (or the receiver was dropped)
//! the subscriber is marked dead and removed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::event::BusEvent;

pub type SubscriberId = u64;

pub const DEFAULT_CAPACITY: usize = 128;

struct QueueInner {
    buf: VecDeque<(u64, BusEvent)>,
    capacity: usize,
    closed: bool,
}

struct Queue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

enum PushOutcome {
    Delivered,
    DeliveredAfterDrop,
    Dead,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                buf: VecDeque::with_capacity(capacity.min(64)),
                capacity,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn push(&self, id: u64, event: BusEvent) -> PushOutcome {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return PushOutcome::Dead;
        }
        if inner.buf.len() < inner.capacity {
            inner.buf.push_back((id, event));
            drop(inner);
            self.notify.notify_one();
            return PushOutcome::Delivered;
        }
        // Full: drop the oldest element, then retry once.
        inner.buf.pop_front();
        if inner.buf.len() < inner.capacity {
            inner.buf.push_back((id, event));
            drop(inner);
            self.notify.notify_one();
            return PushOutcome::DeliveredAfterDrop;
        }
        // Still full (only possible when capacity == 0): subscriber is dead.
        PushOutcome::Dead
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.notify.notify_one();
    }
}

/// Receiver half of one subscription. Dropping it marks the queue closed so
/// the next publish will evict the subscriber.
pub struct Subscriber {
    pub id: SubscriberId,
    queue: Arc<Queue>,
}

impl Subscriber {
    /// Awaits the next `(event_id, event)`. Returns `None` once the bus has
    /// unsubscribed this receiver.
    pub async fn recv(&mut self) -> Option<(u64, BusEvent)> {
        loop {
            {
                let mut inner = self.queue.inner.lock().unwrap();
                if let Some(item) = inner.buf.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            self.queue.notify.notified().await;
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.queue.close();
    }
}

struct Registration {
    queue: Arc<Queue>,
}

/// The bus itself: one monotonic id counter, one subscriber registry.
pub struct EventBus {
    session_id: String,
    next_event_id: AtomicU64,
    next_subscriber_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, Registration>>,
}

impl EventBus {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            next_event_id: AtomicU64::new(1),
            next_subscriber_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Registers a new subscriber with the default bounded capacity.
    pub fn subscribe(&self) -> Subscriber {
        self.subscribe_with_capacity(DEFAULT_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscriber {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::new(Queue::new(capacity));
        self.subscribers
            .lock()
            .unwrap()
            .insert(id, Registration { queue: queue.clone() });
        Subscriber { id, queue }
    }

    /// Idempotent: removing an id that is not (or no longer) registered is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Some(reg) = self.subscribers.lock().unwrap().remove(&id) {
            reg.queue.close();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Assigns a monotonic event id and broadcasts to every current
    /// subscriber. Returns the assigned id.
    pub fn publish(&self, event: BusEvent) -> u64 {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);

        let snapshot: Vec<(SubscriberId, Arc<Queue>)> = {
            let subs = self.subscribers.lock().unwrap();
            subs.iter().map(|(k, v)| (*k, v.queue.clone())).collect()
        };

        let mut dead = Vec::new();
        for (sub_id, queue) in snapshot {
            match queue.push(id, event.clone()) {
                PushOutcome::Delivered | PushOutcome::DeliveredAfterDrop => {}
                PushOutcome::Dead => dead.push(sub_id),
            }
        }

        if !dead.is_empty() {
            let mut subs = self.subscribers.lock().unwrap();
            for id in dead {
                if let Some(reg) = subs.remove(&id) {
                    reg.queue.close();
                }
            }
        }

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_event(n: u32) -> BusEvent {
        BusEvent::Custom {
            scope: "test".to_string(),
            payload: serde_json::json!({ "n": n }),
        }
    }

    #[tokio::test]
    async fn subscribe_then_publish_delivers_in_order() {
        let bus = EventBus::new("bus-1");
        let mut sub = bus.subscribe();
        bus.publish(custom_event(1));
        bus.publish(custom_event(2));
        let (id1, _) = sub.recv().await.unwrap();
        let (id2, _) = sub.recv().await.unwrap();
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn full_queue_drops_oldest_element() {
        let bus = EventBus::new("bus-1");
        let sub = bus.subscribe_with_capacity(2);
        bus.publish(custom_event(1));
        bus.publish(custom_event(2));
        bus.publish(custom_event(3)); // queue at capacity 2: drops event 1
        let mut sub = sub;
        let (_, first) = sub.recv().await.unwrap();
        let (_, second) = sub.recv().await.unwrap();
        assert!(matches!(first, BusEvent::Custom { payload, .. } if payload["n"] == 2));
        assert!(matches!(second, BusEvent::Custom { payload, .. } if payload["n"] == 3));
    }

    #[tokio::test]
    async fn dropped_subscriber_is_evicted_on_next_publish() {
        let bus = EventBus::new("bus-1");
        let sub = bus.subscribe();
        let id = sub.id;
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        // Dead subscribers are pruned lazily, on the next publish that
        // reaches a closed queue.
        bus.publish(custom_event(1));
        assert_eq!(bus.subscriber_count(), 0);
        // unsubscribe is idempotent even after the bus already pruned it.
        bus.unsubscribe(id);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = EventBus::new("bus-1");
        let sub = bus.subscribe();
        let id = sub.id;
        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
