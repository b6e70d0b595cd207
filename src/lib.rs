//! # jobvisor
//!
//! **Jobvisor** is a job automation engine for Rust.
//!
//! A job is a trigger plus an ordered list of tasks; each task pushes data
//! items through a chain of actions. Contiguous actions with the same thread
//! count share a pool of workers (a concurrency group), and groups are chained
//! through bounded queues. A slot-limited executor starts waiting executions,
//! reaps finished ones and routes events to event-triggered jobs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ExecutionRepository      JobRepository          JobTriggerEvent
//!        (WAITING)           (find_by_id)              (inbound)
//!            └──────────────────┬─────────────────────────┘
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  JobExecutor (single actor, fixed tick)                           │
//! │  - reaps finished runs, persists records, resolves old failures   │
//! │  - enforces job_queue_size slots                                  │
//! │  - spawns one Tokio task per started job                          │
//! └──────┬──────────────────────────────┬──────────────────────┬──────┘
//!        ▼                              ▼                      ▼
//!    Job::run()                     Job::run()        publish(JobEvent)
//!        │ for each active task                                │
//!        ▼                                                     ▼
//!    Task::run()                                     Bus ──► SubscriberSet
//!        │                                                     │
//!        ▼                                           ┌─────────┼─────────┐
//!    JobStarter (default | event-triggered)          ▼         ▼         ▼
//!        │                                        LogWriter  Metrics   Custom
//!        ▼
//!  [initial queue] ─► group 0 (N workers) ─► [queue] ─► group 1 ─► … ─► sink
//! ```
//!
//! ### Execution lifecycle
//! ```text
//! WAITING ──► RUNNING ──► FINISHED | FAILED | CANCELLED
//!        └──► ACTIVE  ──► CANCELLED | FAILED         (event-triggered jobs)
//!
//! FAILED ──► RESOLVED   (fault-tolerant job ran again)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                              |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------------|
//! | **Components**    | Roles plugged into a pipeline, sharing lifecycle hooks.      | [`Action`], [`Trigger`], [`EventTrigger`], [`Provider`], [`Connector`] |
//! | **Pipelines**     | Partitioning, worker pools and bounded queues.               | [`ConcurrencyGroup`], [`DataQueue`], [`JobStarter`] |
//! | **Jobs**          | Tasks, jobs, execution state and dry runs.                   | [`Job`], [`Task`], [`JobExecution`], [`TaskSimulation`] |
//! | **Scheduling**    | Slot-limited executor, actor handle.                         | [`JobExecutor`], [`ExecutorHandle`]             |
//! | **Persistence**   | Collaborator interfaces and in-memory implementations.       | [`ExecutionRepository`], [`JobRepository`]      |
//! | **Events**        | Job state events, fan-out to subscribers.                    | [`JobEvent`], [`Bus`], [`Subscribe`]            |
//! | **Errors**        | Typed errors per layer.                                      | [`ComponentError`], [`PipelineError`], [`ExecutorError`] |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (on by default).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use jobvisor::{
//!     Action, ActionSettings, ComponentError, DataItem, ExecutorConfig, InMemoryExecutionRepository,
//!     InMemoryJobRepository, Job, JobExecution, JobExecutionState, JobExecutorBuilder, Lifecycle, Task,
//! };
//!
//! struct Greet {
//!     settings: ActionSettings,
//! }
//!
//! impl Lifecycle for Greet {}
//!
//! #[async_trait]
//! impl Action for Greet {
//!     fn id(&self) -> &str { "greet" }
//!     fn settings(&self) -> &ActionSettings { &self.settings }
//!
//!     async fn process(&self, item: &DataItem, _: &JobExecution) -> Result<Vec<DataItem>, ComponentError> {
//!         let mut out = item.clone();
//!         out.data_mut().insert("greeting".into(), "hello".into());
//!         Ok(vec![out])
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let jobs = Arc::new(InMemoryJobRepository::new());
//!     let executions = Arc::new(InMemoryExecutionRepository::new());
//!
//!     let task = Task::builder("greet-task")
//!         .with_action(Arc::new(Greet { settings: ActionSettings::new(2) }))
//!         .build();
//!     jobs.insert(Job::builder("hello").with_task(task).build());
//!     let queued = executions.enqueue("hello");
//!
//!     let mut executor = JobExecutorBuilder::new(ExecutorConfig::default(), jobs, executions.clone()).build();
//!     executor.update().await;
//!     while executor.pending_runs() > 0 {
//!         tokio::time::sleep(std::time::Duration::from_millis(20)).await;
//!         executor.update().await;
//!     }
//!
//!     assert_eq!(executions.get(queued.id).map(|r| r.state), Some(JobExecutionState::Finished));
//! }
//! ```

mod components;
mod data;
mod error;
mod events;
mod execution;
mod executor;
mod jobs;
mod pipeline;
mod repository;
mod subscribers;

// ---- Public re-exports ----

pub use components::{
    Action, ActionRef, ActionSettings, Connector, ConnectorRef, EventQueueSlot, EventTrigger,
    EventType, Lifecycle, ProcessingFinishedCallback, Provider, ProviderRef, RunContext, Trigger,
    TriggerRef,
};
pub use data::{DataItem, DataKey, Map, Value};
pub use error::{ComponentError, EventError, ExecutorError, PipelineError, RepositoryError};
pub use events::{Bus, EventPublisher, JobEvent, JobEventKind, JobTriggerEvent};
pub use execution::{ExecutionRecord, JobExecution, JobExecutionState};
pub use executor::{ExecutorConfig, ExecutorHandle, JobExecutor, JobExecutorBuilder};
pub use jobs::{Job, JobBuilder, StageResult, Task, TaskBuilder, TaskSimulation};
pub use pipeline::{
    ActionGroup, ConcurrencyGroup, DataQueue, DefaultJobStarter, EventTriggeredJobStarter,
    InFlight, JobStarter, PipelineConfig, partition,
};
pub use repository::{
    ExecutionRepository, InMemoryExecutionRepository, InMemoryJobRepository, JobRepository, Page,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple tracing-backed logger.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
