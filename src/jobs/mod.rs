//! # Jobs and tasks.
//!
//! A [`Job`] owns a trigger and an ordered list of [`Task`]s sharing one
//! execution. Tasks run one after another; each task runs its own pipeline.
//!
//! ```text
//! Job::run(execution)
//!   ├─► execution WAITING → RUNNING (ACTIVE for event triggers)
//!   ├─► for task in active tasks (stop once the execution is no longer live):
//!   │       Task::run() ─► JobStarter ─► groups ─► complete / shutdown / await_termination
//!   ├─► Ok  ─► RUNNING/ACTIVE → FINISHED
//!   ├─► Err ─► FAILED (cause recorded)
//!   └─► finish time stamped in every case
//! ```
//!
//! Dry runs ([`Job::simulate`]) execute the same chains sequentially in the
//! caller's task and return a copy of every stage's output.

mod job;
mod simulation;
mod task;

pub use job::{Job, JobBuilder};
pub use simulation::{StageResult, TaskSimulation};
pub use task::{Task, TaskBuilder};
