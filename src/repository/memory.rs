use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RepositoryError;
use crate::execution::{ExecutionRecord, JobExecutionState};
use crate::jobs::Job;

use super::{ExecutionRepository, JobRepository, Page};

/// Execution records kept in memory, ordered by id (creation order).
#[derive(Debug, Default)]
pub struct InMemoryExecutionRepository {
    records: RwLock<BTreeMap<u64, ExecutionRecord>>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record, replacing one with the same id.
    pub fn insert(&self, record: ExecutionRecord) {
        self.records.write().insert(record.id, record);
    }

    /// Queues a new `WAITING` execution for `job_id` and returns it.
    pub fn enqueue(&self, job_id: &str) -> ExecutionRecord {
        let record = ExecutionRecord::waiting(job_id);
        self.insert(record.clone());
        record
    }

    pub fn get(&self, id: u64) -> Option<ExecutionRecord> {
        self.records.read().get(&id).cloned()
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<ExecutionRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Records of one job, oldest first.
    pub fn of_job(&self, job_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .read()
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn find_in_state(
        &self,
        state: JobExecutionState,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ExecutionRecord>, RepositoryError> {
        let records = self.records.read();
        let matching: Vec<&ExecutionRecord> =
            records.values().filter(|r| r.state == state).collect();
        let items = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| (*r).clone())
            .collect();
        Ok(Page {
            items,
            offset,
            limit,
            total: matching.len(),
        })
    }

    async fn upsert(&self, record: ExecutionRecord) -> Result<(), RepositoryError> {
        self.insert(record);
        Ok(())
    }

    async fn update_all_job_executions_of_job(
        &self,
        job_id: &str,
        from: JobExecutionState,
        to: JobExecutionState,
    ) -> Result<usize, RepositoryError> {
        let mut records = self.records.write();
        let mut moved = 0;
        for record in records
            .values_mut()
            .filter(|r| r.job_id == job_id && r.state == from)
        {
            record.state = to;
            moved += 1;
        }
        Ok(moved)
    }
}

/// Job definitions kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job under its id, returning the shared handle.
    pub fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.jobs
            .write()
            .insert(job.id().to_owned(), Arc::clone(&job));
        job
    }

    /// Removes a job; waiting executions that reference it are then skipped.
    pub fn remove(&self, job_id: &str) -> Option<Arc<Job>> {
        self.jobs.write().remove(job_id)
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, job_id: &str) -> Result<Option<Arc<Job>>, RepositoryError> {
        Ok(self.jobs.read().get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_in_state_pages_oldest_first() {
        let repo = InMemoryExecutionRepository::new();
        let a = repo.enqueue("a");
        let b = repo.enqueue("b");
        let c = repo.enqueue("c");
        let mut done = c.clone();
        done.state = JobExecutionState::Finished;
        repo.insert(done);

        let page = repo
            .find_in_state(JobExecutionState::Waiting, 0, usize::MAX)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(
            page.items.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );

        let page = repo
            .find_in_state(JobExecutionState::Waiting, 1, 1)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, b.id);
    }

    #[tokio::test]
    async fn test_bulk_transition_touches_only_matching_job_and_state() {
        let repo = InMemoryExecutionRepository::new();
        for (job, state) in [
            ("j", JobExecutionState::Failed),
            ("j", JobExecutionState::Failed),
            ("j", JobExecutionState::Finished),
            ("k", JobExecutionState::Failed),
        ] {
            let mut r = ExecutionRecord::waiting(job);
            r.state = state;
            repo.insert(r);
        }

        let moved = repo
            .update_all_job_executions_of_job(
                "j",
                JobExecutionState::Failed,
                JobExecutionState::Resolved,
            )
            .await
            .unwrap();
        assert_eq!(moved, 2);
        assert!(
            repo.of_job("k")
                .iter()
                .all(|r| r.state == JobExecutionState::Failed)
        );
        assert!(
            repo.of_job("j")
                .iter()
                .all(|r| r.state != JobExecutionState::Failed)
        );
    }

    #[tokio::test]
    async fn test_job_lookup_after_removal() {
        let repo = InMemoryJobRepository::new();
        repo.insert(Job::builder("j").build());
        assert!(repo.find_by_id("j").await.unwrap().is_some());
        repo.remove("j");
        assert!(repo.find_by_id("j").await.unwrap().is_none());
    }
}
