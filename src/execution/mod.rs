//! # Job executions: the mutable state record of one run attempt.
//!
//! A [`JobExecution`] is shared between the running [`Job`](crate::Job), its
//! concurrency groups (cancellation checks) and the executor's bookkeeping.
//! Its state lives in an atomic so cancellation and failure become visible
//! to every worker without taking a lock.
//!
//! ## State machine
//! ```text
//! WAITING ──► RUNNING ──► FINISHED | FAILED | CANCELLED
//!    │
//!    └──────► ACTIVE ───► FINISHED | FAILED | CANCELLED     (event-triggered jobs)
//!
//! FAILED ───► RESOLVED   (bookkeeping, applied by the executor to fault-tolerant jobs)
//! ```
//!
//! [`ExecutionRecord`] is a plain snapshot used by repositories.

mod job_execution;
mod state;

pub use job_execution::{ExecutionRecord, JobExecution};
pub use state::JobExecutionState;
