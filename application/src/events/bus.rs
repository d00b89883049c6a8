//! Event bus for run observation
//!
//! Pub/sub over a Tokio broadcast channel. The bus stamps each event with
//! its sequence number and sends it while holding one lock, so every
//! subscriber receives the same total order no matter how many tasks
//! publish concurrently.
//!
//! Each subscriber reads at its own pace from a bounded queue. Publishing
//! never waits for subscribers: a subscriber that falls more than
//! `capacity` events behind loses the oldest unread ones, and its
//! [`EventSubscription::dropped`] counter records how many.

use council_domain::{Event, EventDraft};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-subscriber queue length
pub const DEFAULT_CAPACITY: usize = 256;

/// Default number of events kept for replay
pub const DEFAULT_RETAIN: usize = 1024;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

#[derive(Debug, Default)]
struct Ledger {
    next_sequence: u64,
    retained: VecDeque<Event>,
}

/// Totally ordered, multi-subscriber event channel
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    ledger: Mutex<Ledger>,
    retain: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_RETAIN)
    }

    /// `capacity` bounds each subscriber's queue; `retain` bounds replay
    pub fn with_capacity(capacity: usize, retain: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            ledger: Mutex::new(Ledger::default()),
            retain,
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Accept an event: assign its sequence number and deliver it
    pub fn publish(&self, draft: EventDraft) -> Event {
        let mut ledger = self.lock();
        let event = draft.accept(ledger.next_sequence);
        ledger.next_sequence += 1;

        if self.retain > 0 {
            if ledger.retained.len() == self.retain {
                ledger.retained.pop_front();
            }
            ledger.retained.push_back(event.clone());
        }

        // No receivers is fine: retained events still replay
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        debug!(
            sequence = event.sequence,
            kind = %event.kind,
            receivers,
            "Event published"
        );
        event
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> EventSubscription {
        // Subscribing under the lock keeps replay + subscribe gap-free
        let _ledger = self.lock();
        EventSubscription {
            receiver: self.sender.subscribe(),
            dropped: 0,
        }
    }

    /// Retained events, oldest first
    pub fn replay(&self) -> Vec<Event> {
        self.lock().retained.iter().cloned().collect()
    }

    /// Number of events accepted so far
    pub fn published(&self) -> u64 {
        self.lock().next_sequence
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's ordered view of the bus
pub struct EventSubscription {
    receiver: broadcast::Receiver<Event>,
    dropped: u64,
}

impl EventSubscription {
    /// Next event, waiting if none is queued. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(_) => return None,
            }
        }
    }

    /// Events this subscriber lost by falling behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + Unpin {
        Box::pin(futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        }))
    }

    fn record_lag(&mut self, missed: u64) {
        self.dropped += missed;
        warn!(missed, total = self.dropped, "Event subscriber lagged; oldest events dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{EventKind, WorkerId};
    use futures::StreamExt;
    use serde_json::json;

    fn draft(n: usize) -> EventDraft {
        EventDraft::new(EventKind::WorkerCompleted).payload(json!({ "n": n }))
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let bus = EventBus::new();
        let a = bus.publish(draft(0));
        let b = bus.publish(draft(1));
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_eq!(bus.published(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish(draft(0).worker(WorkerId::new("a")));

        let x = first.recv().await.unwrap();
        let y = second.recv().await.unwrap();
        assert_eq!(x, y);
        assert_eq!(x.worker_id, Some(WorkerId::new("a")));
        assert!(first.try_recv().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_total_order_across_concurrent_producers() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 50;

        let bus = EventBus::with_capacity(PRODUCERS * PER_PRODUCER, 0).shared();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let mut handles = Vec::new();
        for p in 0..PRODUCERS {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    bus.publish(draft(p * PER_PRODUCER + i));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut seen_first = Vec::new();
        let mut seen_second = Vec::new();
        for _ in 0..PRODUCERS * PER_PRODUCER {
            seen_first.push(first.recv().await.unwrap());
            seen_second.push(second.recv().await.unwrap());
        }

        let sequences: Vec<u64> = seen_first.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (0..(PRODUCERS * PER_PRODUCER) as u64).collect();
        assert_eq!(sequences, expected);
        assert_eq!(seen_first, seen_second);
        assert_eq!(first.dropped(), 0);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let bus = EventBus::with_capacity(4, 0);
        let mut slow = bus.subscribe();
        for i in 0..10 {
            bus.publish(draft(i));
        }

        let received: Vec<u64> = std::iter::from_fn(|| slow.try_recv())
            .map(|e| e.sequence)
            .collect();
        assert_eq!(received, vec![6, 7, 8, 9]);
        assert_eq!(slow.dropped(), 6);
    }

    #[test]
    fn test_replay_keeps_most_recent() {
        let bus = EventBus::with_capacity(8, 3);
        for i in 0..5 {
            bus.publish(draft(i));
        }
        let replay: Vec<u64> = bus.replay().iter().map(|e| e.sequence).collect();
        assert_eq!(replay, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_into_stream_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let stream = bus.subscribe().into_stream();
        bus.publish(draft(0));
        bus.publish(draft(1));
        drop(bus);

        let events: Vec<Event> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].sequence, 1);
    }
}
