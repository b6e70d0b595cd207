//! # Bounded hand-off queue between pipeline stages.
//!
//! [`DataQueue`] connects a producer (job starter or upstream group) with the
//! workers of the next group. All waits are bounded: `offer` and `poll` take a
//! timeout so callers can re-check cancellation between attempts.
//!
//! ## In-flight tracking
//! `poll` hands out an [`InFlight`] guard with every item. The queue counts
//! outstanding guards; it is *settled* only when it is empty **and** no item
//! is in flight. A consumer drops the guard after it pushed all results
//! downstream, so a settled input queue means the consuming group is idle.
//!
//! ```text
//!  offer ──► [ items ] ──► poll ──► (item, InFlight) ──► process ──► push downstream
//!                                        │                                  │
//!                                        └──────────── drop ◄───────────────┘
//!                                               in_flight -= 1, notify settled
//! ```
//!
//! ## Sinks
//! A sink accepts every item and discards it. It terminates a pipeline whose
//! output nobody consumes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};

use crate::data::DataItem;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<DataItem>,
    in_flight: usize,
    accepted: u64,
}

/// Bounded MPMC queue of data items with in-flight tracking.
#[derive(Debug)]
pub struct DataQueue {
    /// `None` for sinks.
    capacity: Option<usize>,
    inner: Mutex<Inner>,
    readable: Notify,
    writable: Notify,
    settled: Notify,
}

impl DataQueue {
    /// Creates a queue holding at most `capacity` items (min 1).
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    /// Creates a sink that accepts and discards every item.
    pub fn sink() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
            readable: Notify::new(),
            writable: Notify::new(),
            settled: Notify::new(),
        }
    }

    /// Tries to enqueue `item`, waiting up to `timeout` for free space.
    ///
    /// Returns the item back if the queue stayed full.
    pub async fn offer(&self, item: DataItem, timeout: Duration) -> Result<(), DataItem> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                match self.capacity {
                    None => {
                        inner.accepted += 1;
                        return Ok(());
                    }
                    Some(cap) if inner.items.len() < cap => {
                        inner.items.push_back(item);
                        inner.accepted += 1;
                        drop(inner);
                        self.readable.notify_one();
                        return Ok(());
                    }
                    Some(_) => {}
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Err(item);
            }
        }
    }

    /// Takes the next item, waiting up to `timeout` for one to arrive.
    ///
    /// Cancel-safe: dropping the returned future never loses an item.
    pub async fn poll(self: &Arc<Self>, timeout: Duration) -> Option<(DataItem, InFlight)> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_take() {
                let guard = InFlight {
                    queue: Arc::clone(self),
                };
                return Some((item, guard));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    fn try_take(&self) -> Option<DataItem> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front()?;
        inner.in_flight += 1;
        drop(inner);
        self.writable.notify_one();
        Some(item)
    }

    /// True if the queue is empty and no polled item is still being handled.
    pub fn is_settled(&self) -> bool {
        let inner = self.inner.lock();
        inner.items.is_empty() && inner.in_flight == 0
    }

    /// Waits up to `timeout` for the queue to settle. Returns the final observation.
    pub async fn wait_settled(&self, timeout: Duration) -> bool {
        let notified = self.settled.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_settled() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
        self.is_settled()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// True if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Number of items handed out by `poll` and not yet released.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Total number of items ever accepted.
    pub fn accepted(&self) -> u64 {
        self.inner.lock().accepted
    }

    /// Capacity, or `None` for sinks.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// True for sinks.
    pub fn is_sink(&self) -> bool {
        self.capacity.is_none()
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        let settled = inner.items.is_empty() && inner.in_flight == 0;
        drop(inner);
        if settled {
            self.settled.notify_waiters();
        }
    }
}

/// Marks a polled item as being handled; releases it on drop.
#[derive(Debug)]
pub struct InFlight {
    queue: Arc<DataQueue>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.queue.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(n: i64) -> DataItem {
        let mut item = DataItem::new();
        item.data_mut().insert("n".into(), json!(n));
        item
    }

    fn n(item: &DataItem) -> i64 {
        item.data().and_then(|d| d.get("n")).and_then(|v| v.as_i64()).unwrap()
    }

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_fifo_order() {
        let q = Arc::new(DataQueue::bounded(4));
        for i in 0..3 {
            q.offer(item(i), SHORT).await.unwrap();
        }
        for i in 0..3 {
            let (it, _guard) = q.poll(SHORT).await.unwrap();
            assert_eq!(n(&it), i);
        }
        assert_eq!(q.accepted(), 3);
    }

    #[tokio::test]
    async fn test_offer_times_out_when_full() {
        let q = DataQueue::bounded(1);
        q.offer(item(1), SHORT).await.unwrap();
        let rejected = q.offer(item(2), SHORT).await.unwrap_err();
        assert_eq!(n(&rejected), 2);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_offer_waits_for_space() {
        let q = Arc::new(DataQueue::bounded(1));
        q.offer(item(1), SHORT).await.unwrap();

        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                q.poll(SHORT).await.map(|(it, _)| n(&it))
            })
        };

        q.offer(item(2), Duration::from_secs(2)).await.unwrap();
        assert_eq!(consumer.await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_poll_times_out_when_empty() {
        let q = Arc::new(DataQueue::bounded(1));
        assert!(q.poll(SHORT).await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_poll_keeps_item() {
        let q = Arc::new(DataQueue::bounded(2));
        {
            let fut = q.poll(Duration::from_secs(5));
            let _ = tokio::time::timeout(SHORT, fut).await;
        }
        q.offer(item(7), SHORT).await.unwrap();
        let (it, _guard) = q.poll(SHORT).await.unwrap();
        assert_eq!(n(&it), 7);
    }

    #[tokio::test]
    async fn test_in_flight_blocks_settlement() {
        let q = Arc::new(DataQueue::bounded(2));
        assert!(q.is_settled());

        q.offer(item(1), SHORT).await.unwrap();
        assert!(!q.is_settled());

        let (_it, guard) = q.poll(SHORT).await.unwrap();
        assert!(q.is_empty());
        assert_eq!(q.in_flight(), 1);
        assert!(!q.is_settled());
        assert!(!q.wait_settled(SHORT).await);

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.wait_settled(Duration::from_secs(2)).await })
        };
        tokio::time::sleep(SHORT).await;
        drop(guard);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_sink_discards() {
        let q = Arc::new(DataQueue::sink());
        for i in 0..10 {
            q.offer(item(i), SHORT).await.unwrap();
        }
        assert!(q.is_sink());
        assert!(q.is_empty());
        assert!(q.is_settled());
        assert_eq!(q.accepted(), 10);
        assert!(q.poll(SHORT).await.is_none());
    }
}
