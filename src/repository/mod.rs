//! # Persistence collaborators consumed by the [`JobExecutor`](crate::JobExecutor).
//!
//! - [`ExecutionRepository`] stores execution snapshots ([`ExecutionRecord`]).
//! - [`JobRepository`] resolves job ids to runnable [`Job`]s.
//!
//! Both are async traits so real backends can do I/O; [`InMemoryExecutionRepository`]
//! and [`InMemoryJobRepository`] are process-local implementations.

mod memory;

pub use memory::{InMemoryExecutionRepository, InMemoryJobRepository};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::execution::{ExecutionRecord, JobExecutionState};
use crate::jobs::Job;

/// One page of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    /// Total number of matches, ignoring paging.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Storage of execution records.
#[async_trait]
pub trait ExecutionRepository: Send + Sync + 'static {
    /// Executions in `state`, oldest first.
    async fn find_in_state(
        &self,
        state: JobExecutionState,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ExecutionRecord>, RepositoryError>;

    /// Inserts or replaces the record with the same id.
    async fn upsert(&self, record: ExecutionRecord) -> Result<(), RepositoryError>;

    /// Moves every execution of `job_id` in state `from` to `to`; returns how many moved.
    async fn update_all_job_executions_of_job(
        &self,
        job_id: &str,
        from: JobExecutionState,
        to: JobExecutionState,
    ) -> Result<usize, RepositoryError>;
}

/// Lookup of job definitions.
#[async_trait]
pub trait JobRepository: Send + Sync + 'static {
    /// `Ok(None)` when the job does not exist (or was deleted).
    async fn find_by_id(&self, job_id: &str) -> Result<Option<Arc<Job>>, RepositoryError>;
}
