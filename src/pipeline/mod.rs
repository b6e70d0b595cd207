//! # Task pipelines.
//!
//! A task's active actions are partitioned into [`ConcurrencyGroup`]s of equal
//! thread count. Groups are chained through bounded [`DataQueue`]s; a
//! [`JobStarter`] wires the chain and feeds its first queue.
//!
//! ```text
//! JobStarter::process()
//!   ├─► partition(actions)          → [ActionGroup { num_threads, actions }, ...]
//!   ├─► Components::initialize()    → connectors, trigger, provider, actions
//!   ├─► build_groups()              → ConcurrencyGroup per partition (workers spawned)
//!   └─► dispatch initial item(s)    → initial DataQueue
//!
//! Task::run()
//!   ├─► group.complete()            (oldest to newest: drain, then flush)
//!   ├─► group.shutdown()            (stop polling)
//!   └─► group.await_termination()   (repeated across all groups until all report true)
//! ```

mod config;
mod group;
mod partition;
mod queue;
mod starter;
mod worker;

pub use config::PipelineConfig;
pub use group::ConcurrencyGroup;
pub use partition::{ActionGroup, partition};
pub use queue::{DataQueue, InFlight};
pub use starter::{DefaultJobStarter, EventTriggeredJobStarter, JobStarter};

pub(crate) use starter::Components;
