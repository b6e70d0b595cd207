//! # Events emitted by the job executor.
//!
//! The [`JobEventKind`] enum classifies events in two groups:
//! - **Job events**: state changes and refreshes of a job's execution
//! - **Runtime events**: executor shutdown and subscriber health
//!
//! Job events carry the affected [`Job`] plus a snapshot of the execution they
//! describe, taken when the event was created (live state, not a storage reload).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! [`JobTriggerEvent`] is the inbound counterpart: a payload addressed to a
//! running event-triggered job.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::components::EventType;
use crate::data::Map;
use crate::execution::ExecutionRecord;
use crate::jobs::Job;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of executor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    // === Job events ===
    /// A job's execution changed state (started, reaped, cancelled).
    ///
    /// Sets `job` and `execution`.
    StateChange,

    /// Visibility refresh for a job that is still waiting or still running.
    ///
    /// Sets `job` and `execution`.
    StateRefresh,

    // === Shutdown events ===
    /// Executor shutdown requested.
    ShutdownRequested,

    /// All running jobs stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; `reason` lists the stuck jobs.
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked; `reason` carries the panic message.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
}

/// Event published through an [`EventPublisher`].
#[derive(Clone)]
pub struct JobEvent {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: JobEventKind,
    /// The affected job (job events only).
    pub job: Option<Arc<Job>>,
    /// Execution snapshot at publish time.
    pub execution: Option<ExecutionRecord>,
    pub reason: Option<Arc<str>>,
}

impl JobEvent {
    /// Creates an event without payload.
    pub fn new(kind: JobEventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            execution: None,
            reason: None,
        }
    }

    /// State change of `job`, carrying its current execution.
    pub fn state_change(job: &Arc<Job>) -> Self {
        Self::for_job(JobEventKind::StateChange, job)
    }

    /// Refresh of `job`, carrying its current execution.
    pub fn state_refresh(job: &Arc<Job>) -> Self {
        Self::for_job(JobEventKind::StateRefresh, job)
    }

    fn for_job(kind: JobEventKind, job: &Arc<Job>) -> Self {
        let mut ev = Self::new(kind);
        ev.execution = job.current_execution().map(|e| e.record());
        ev.job = Some(Arc::clone(job));
        ev
    }

    /// Replaces the execution snapshot.
    #[inline]
    pub fn with_execution(mut self, record: ExecutionRecord) -> Self {
        self.execution = Some(record);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Self::new(JobEventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Self::new(JobEventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// Id of the affected job, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.job.as_deref().map(Job::id)
    }

    #[inline]
    pub fn is_job_event(&self) -> bool {
        matches!(
            self.kind,
            JobEventKind::StateChange | JobEventKind::StateRefresh
        )
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            JobEventKind::SubscriberOverflow | JobEventKind::SubscriberPanicked
        )
    }
}

impl std::fmt::Debug for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEvent")
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .field("job", &self.job_id())
            .field("state", &self.execution.as_ref().map(|e| e.state))
            .field("reason", &self.reason)
            .finish()
    }
}

/// Sink for executor events. Fire-and-forget.
pub trait EventPublisher: Send + Sync + 'static {
    fn publish(&self, event: JobEvent);
}

/// Payload addressed to a running event-triggered job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTriggerEvent {
    pub job_id: String,
    pub event_type: EventType,
    pub data: Map,
}

impl JobTriggerEvent {
    pub fn new(job_id: impl Into<String>, event_type: EventType, data: Map) -> Self {
        Self {
            job_id: job_id.into(),
            event_type,
            data,
        }
    }
}
