//! # Event subscribers.
//!
//! Subscribers observe [`JobEvent`]s fanned out by the [`SubscriberSet`].
//!
//! ```text
//! JobExecutor ── publish(JobEvent) ──► Bus ──► listener ──► SubscriberSet
//!                                                              │
//!                                               ┌──────────────┼──────────┐
//!                                               ▼              ▼          ▼
//!                                           LogWriter       Metrics     Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```rust
//! use async_trait::async_trait;
//! use jobvisor::{JobEvent, JobEventKind, Subscribe};
//!
//! struct FailureAlerts;
//!
//! #[async_trait]
//! impl Subscribe for FailureAlerts {
//!     async fn on_event(&self, event: &JobEvent) {
//!         if event.kind == JobEventKind::StateChange {
//!             // inspect event.execution and page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-alerts"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;

use async_trait::async_trait;

use crate::events::JobEvent;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &JobEvent);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped**.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
