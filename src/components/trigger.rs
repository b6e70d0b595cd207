use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::data::Map;
use crate::error::EventError;

use super::{Lifecycle, ProcessingFinishedCallback};

/// Kinds of external events an event trigger can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Inbound HTTP call on a job's web hook.
    WebHook,
    /// Message received from a broker.
    Message,
}

/// Produces the first item(s) of a job run.
pub trait Trigger: Lifecycle {
    /// Stable id (for logs).
    fn id(&self) -> &str;

    /// Static data placed into the `data` section of every initial item.
    fn data(&self) -> Map {
        Map::new()
    }

    /// Extra entries for the `meta` section of every initial item.
    fn meta_data(&self) -> Map {
        Map::new()
    }

    /// Returns `Some` if this trigger is event-driven.
    fn as_event_trigger(&self) -> Option<&dyn EventTrigger> {
        None
    }

    /// Acknowledgement target for items that fully left the pipeline.
    fn finished_callback(&self) -> Option<Arc<dyn ProcessingFinishedCallback>> {
        None
    }
}

/// A trigger that keeps a job `ACTIVE` and feeds it one item per external event.
///
/// Implementations embed an [`EventQueueSlot`]; the event-triggered job starter
/// attaches a bounded queue to it for the lifetime of the run.
pub trait EventTrigger: Trigger {
    /// The kind of event this trigger accepts.
    fn event_type(&self) -> EventType;

    /// The slot the running job starter listens on.
    fn event_queue(&self) -> &EventQueueSlot;

    /// Queues an event for the running job. Fails if nobody listens or the queue is full.
    fn process_event(&self, data: Map) -> Result<(), EventError> {
        self.event_queue().push(data)
    }

    /// Sample events used by dry runs.
    fn simulation_data(&self) -> Vec<Map> {
        Vec::new()
    }
}

/// Shared trigger handle.
pub type TriggerRef = Arc<dyn Trigger>;

/// Sending half of an event trigger's queue, attached while a job listens.
#[derive(Default)]
pub struct EventQueueSlot {
    tx: Mutex<Option<mpsc::Sender<Map>>>,
}

impl EventQueueSlot {
    /// Creates an empty (detached) slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a fresh bounded queue and returns its receiving half.
    ///
    /// A previously attached queue is replaced.
    pub fn attach(&self, capacity: usize) -> mpsc::Receiver<Map> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *self.tx.lock() = Some(tx);
        rx
    }

    /// Detaches the current queue; later events are rejected.
    pub fn detach(&self) {
        self.tx.lock().take();
    }

    /// True while a queue is attached.
    pub fn is_attached(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Queues an event without waiting.
    pub fn push(&self, data: Map) -> Result<(), EventError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(EventError::NotListening)?;
        tx.try_send(data).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EventError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EventError::NotListening,
        })
    }
}

impl std::fmt::Debug for EventQueueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueueSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
