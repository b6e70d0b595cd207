//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::error::panic_message;
use crate::events::{Bus, JobEvent};

use super::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<JobEvent>>,
}

/// Fan-out coordinator with per-subscriber queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Panics and overflows are reported back through `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<JobEvent>>(cap);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(&*panic_err);
                        warn!(subscriber = sub.name(), %info, "subscriber panicked");
                        bus_for_worker.publish(JobEvent::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all subscribers.
    ///
    /// Subscriber events that overflow are not re-published, so an overloaded
    /// subscriber cannot feed itself.
    pub fn emit(&self, event: Arc<JobEvent>) {
        let feedback = event.is_subscriber_event();

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            warn!(subscriber = channel.name, reason, seq = event.seq, "event dropped");
            if !feedback {
                self.bus
                    .publish(JobEvent::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Closes all queues and awaits the workers.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::JobEventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<JobEventKind>>,
    }

    #[async_trait]
    impl Subscribe for Arc<Recorder> {
        async fn on_event(&self, event: &JobEvent) {
            self.seen.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Boom;

    #[async_trait]
    impl Subscribe for Boom {
        async fn on_event(&self, event: &JobEvent) {
            if event.kind == JobEventKind::GraceExceeded {
                panic!("boom");
            }
        }

        fn name(&self) -> &'static str {
            "boom"
        }
    }

    #[tokio::test]
    async fn test_events_reach_every_subscriber_in_order() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let set = SubscriberSet::new(
            vec![
                Arc::new(Arc::clone(&a)) as Arc<dyn Subscribe>,
                Arc::new(Arc::clone(&b)) as Arc<dyn Subscribe>,
            ],
            Bus::new(8),
        );
        assert_eq!(set.len(), 2);

        set.emit(Arc::new(JobEvent::new(JobEventKind::ShutdownRequested)));
        set.emit(Arc::new(JobEvent::new(JobEventKind::AllStoppedWithin)));
        set.shutdown().await;

        let expected = vec![
            JobEventKind::ShutdownRequested,
            JobEventKind::AllStoppedWithin,
        ];
        assert_eq!(*a.seen.lock(), expected);
        assert_eq!(*b.seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_worker_survives() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Boom), Arc::new(Arc::clone(&rec))];
        let set = SubscriberSet::new(subs, bus);

        set.emit(Arc::new(JobEvent::new(JobEventKind::GraceExceeded)));
        let reported = rx.recv().await.unwrap();
        assert_eq!(reported.kind, JobEventKind::SubscriberPanicked);
        assert!(reported.reason.as_deref().unwrap().contains("boom"));

        set.emit(Arc::new(JobEvent::new(JobEventKind::AllStoppedWithin)));
        set.shutdown().await;
        assert_eq!(rec.seen.lock().len(), 2);
    }
}
