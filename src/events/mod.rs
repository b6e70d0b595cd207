//! Executor events: types and broadcast bus.
//!
//! ## Contents
//! - [`JobEventKind`], [`JobEvent`] event classification and payload
//! - [`EventPublisher`] the sink the executor publishes into
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`, the default publisher
//! - [`JobTriggerEvent`] inbound payload for event-triggered jobs

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventPublisher, JobEvent, JobEventKind, JobTriggerEvent};
