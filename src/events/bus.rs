//! # Event bus for broadcasting executor events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The executor
//! publishes into it; a single listener fans events out to the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! JobExecutor ──► Bus ───► listener ────► SubscriberSet
//!               (broadcast)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::event::{EventPublisher, JobEvent};

/// Broadcast channel for executor events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<JobEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<JobEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: JobEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for Bus {
    fn publish(&self, event: JobEvent) {
        Bus::publish(self, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::JobEventKind;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_receivers_get_events_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(JobEvent::new(JobEventKind::ShutdownRequested));

        let mut rx = bus.subscribe();
        bus.publish(JobEvent::new(JobEventKind::AllStoppedWithin));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, JobEventKind::AllStoppedWithin);
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let bus = Bus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(JobEvent::new(JobEventKind::ShutdownRequested));
        bus.publish(JobEvent::new(JobEventKind::GraceExceeded));

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(1))));
        assert_eq!(rx.recv().await.unwrap().kind, JobEventKind::GraceExceeded);
    }
}
