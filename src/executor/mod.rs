//! # Job executor: process-wide scheduling of job runs.
//!
//! ```text
//!   ExecutionRepository ──WAITING──►┌──────────────┐── spawn ──► Job::run (one task per job)
//!   JobRepository ───── find ──────►│ JobExecutor  │◄── reap ─── finished runs
//!   JobTriggerEvent ── route ──────►│  update()    │── publish ─► EventPublisher (Bus)
//!                                   └──────────────┘
//! ```
//!
//! - [`JobExecutor`] owns the running-job map and the pending runs; all
//!   mutation goes through `&mut self`.
//! - [`JobExecutor::spawn`] turns it into an actor ticking every
//!   [`ExecutorConfig::tick`]; [`ExecutorHandle`] talks to it by message.
//! - [`JobExecutorBuilder`] wires a [`Bus`](crate::Bus) and subscribers.
//!
//! ## Slots
//! Ordinary jobs start only while `job_queue_size` minus running jobs is
//! positive. Event-triggered jobs start regardless and then occupy a slot for
//! as long as they stay `ACTIVE`. A job already running is never started twice;
//! its further waiting executions stay `WAITING` and get refresh events.

mod builder;
mod config;
mod handle;
mod scheduler;
mod signal;

pub use builder::JobExecutorBuilder;
pub use config::ExecutorConfig;
pub use handle::ExecutorHandle;
pub use scheduler::JobExecutor;
