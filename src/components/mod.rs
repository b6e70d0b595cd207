//! # Pipeline components: actions, triggers, providers and connectors.
//!
//! Every component role is a small trait sharing the [`Lifecycle`] hooks.
//! Shared per-role state is provided by helper structs that concrete
//! components embed: [`ActionSettings`] for actions and [`EventQueueSlot`]
//! for event triggers.
//!
//! ```text
//!                      Lifecycle (initialize / shutdown / connectors)
//!        ┌──────────────┬──────────┴───┬──────────────┐
//!     Action         Trigger        Provider       Connector
//!                       │
//!                  EventTrigger (event_type / event_queue / process_event)
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use jobvisor::{Action, ActionSettings, ComponentError, DataItem, JobExecution, Lifecycle};
//!
//! struct Uppercase {
//!     settings: ActionSettings,
//! }
//!
//! impl Lifecycle for Uppercase {}
//!
//! #[async_trait]
//! impl Action for Uppercase {
//!     fn id(&self) -> &str { "uppercase" }
//!     fn settings(&self) -> &ActionSettings { &self.settings }
//!
//!     async fn process(&self, item: &DataItem, _: &JobExecution) -> Result<Vec<DataItem>, ComponentError> {
//!         let mut out = item.clone();
//!         if let Some(name) = item.data().and_then(|d| d.get("name")).and_then(|v| v.as_str()) {
//!             out.data_mut().insert("name".into(), name.to_uppercase().into());
//!         }
//!         Ok(vec![out])
//!     }
//! }
//! ```

mod action;
mod lifecycle;
mod provider;
mod trigger;

pub use action::{Action, ActionRef, ActionSettings, ProcessingFinishedCallback};
pub use lifecycle::{Connector, ConnectorRef, Lifecycle, RunContext};
pub use provider::{Provider, ProviderRef};
pub use trigger::{EventQueueSlot, EventTrigger, EventType, Trigger, TriggerRef};
