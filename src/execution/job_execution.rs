use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;

use super::JobExecutionState;

/// Global sequence for executions created in-process.
static EXECUTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Snapshot of a [`JobExecution`], as persisted by repositories.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    /// Execution id.
    pub id: u64,
    /// Id of the executed job.
    pub job_id: String,
    /// State at snapshot time.
    pub state: JobExecutionState,
    /// When the execution was queued.
    pub created: SystemTime,
    /// When the run started.
    pub started: Option<SystemTime>,
    /// When the run ended.
    pub finished: Option<SystemTime>,
    /// Name of the task running at snapshot time.
    pub current_task: Option<String>,
    /// Failure cause, if the execution failed.
    pub error_cause: Option<String>,
    /// Events processed by an event-triggered job.
    pub processed_events: u64,
}

impl ExecutionRecord {
    /// Creates a fresh `WAITING` record for the given job.
    pub fn waiting(job_id: impl Into<String>) -> Self {
        Self {
            id: EXECUTION_SEQ.fetch_add(1, Ordering::Relaxed),
            job_id: job_id.into(),
            state: JobExecutionState::Waiting,
            created: SystemTime::now(),
            started: None,
            finished: None,
            current_task: None,
            error_cause: None,
            processed_events: 0,
        }
    }
}

#[derive(Debug)]
struct Details {
    created: SystemTime,
    started: Option<SystemTime>,
    finished: Option<SystemTime>,
    current_task: Option<String>,
    error_cause: Option<String>,
}

/// Live state of one run attempt of a job.
///
/// The state is kept in an atomic; every transition helper is a compare-and-swap
/// so concurrent cancel/fail/finish calls settle on exactly one outcome.
#[derive(Debug)]
pub struct JobExecution {
    id: u64,
    job_id: String,
    state: AtomicU8,
    processed_events: AtomicU64,
    details: Mutex<Details>,
}

impl JobExecution {
    /// Creates a new `WAITING` execution for the given job.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self::from_record(&ExecutionRecord::waiting(job_id))
    }

    /// Rebuilds a live execution from a persisted record.
    pub fn from_record(record: &ExecutionRecord) -> Self {
        Self {
            id: record.id,
            job_id: record.job_id.clone(),
            state: AtomicU8::new(record.state as u8),
            processed_events: AtomicU64::new(record.processed_events),
            details: Mutex::new(Details {
                created: record.created,
                started: record.started,
                finished: record.finished,
                current_task: record.current_task.clone(),
                error_cause: record.error_cause.clone(),
            }),
        }
    }

    /// Takes a snapshot for persistence.
    pub fn record(&self) -> ExecutionRecord {
        let details = self.details.lock();
        ExecutionRecord {
            id: self.id,
            job_id: self.job_id.clone(),
            state: self.state(),
            created: details.created,
            started: details.started,
            finished: details.finished,
            current_task: details.current_task.clone(),
            error_cause: details.error_cause.clone(),
            processed_events: self.processed_events(),
        }
    }

    /// Execution id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the executed job.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> JobExecutionState {
        JobExecutionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while `Running` or `Active`.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Moves `WAITING` to `live` (`Running` or `Active`) and stamps the start time.
    ///
    /// Returns `false` if the execution was not waiting.
    pub fn begin(&self, live: JobExecutionState) -> bool {
        debug_assert!(live.is_live());
        let moved = self
            .state
            .compare_exchange(
                JobExecutionState::Waiting as u8,
                live as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.details.lock().started = Some(SystemTime::now());
        }
        moved
    }

    /// Moves a live execution to `CANCELLED`. Advisory: components observe it at their polling points.
    pub fn cancel(&self) -> bool {
        self.transition_from_live(JobExecutionState::Cancelled)
    }

    /// Moves a live execution to `FINISHED`.
    pub fn finish(&self) -> bool {
        self.transition_from_live(JobExecutionState::Finished)
    }

    /// Moves a live execution to `FAILED`, recording the cause.
    ///
    /// Returns `false` (and keeps the earlier outcome) if the execution was no longer live.
    /// The cause is written under the same lock as the transition, so a
    /// [`record`](Self::record) never shows `FAILED` without its cause.
    pub fn fail_if_live(&self, cause: impl Into<String>) -> bool {
        let mut details = self.details.lock();
        let failed = self.transition_from_live(JobExecutionState::Failed);
        if failed {
            details.error_cause = Some(cause.into());
        }
        failed
    }

    /// Marks the execution `FAILED` regardless of its state.
    ///
    /// An earlier failure cause is kept.
    pub fn fail(&self, cause: impl Into<String>) {
        let mut details = self.details.lock();
        let previous = JobExecutionState::from_u8(
            self.state
                .swap(JobExecutionState::Failed as u8, Ordering::AcqRel),
        );
        if previous != JobExecutionState::Failed || details.error_cause.is_none() {
            details.error_cause = Some(cause.into());
        }
    }

    /// Stamps the finish time.
    pub fn mark_finished(&self) {
        self.details.lock().finished = Some(SystemTime::now());
    }

    /// Records the task currently being run.
    pub fn set_current_task(&self, name: impl Into<String>) {
        self.details.lock().current_task = Some(name.into());
    }

    /// Name of the task currently being run.
    pub fn current_task(&self) -> Option<String> {
        self.details.lock().current_task.clone()
    }

    /// Failure cause, if any.
    pub fn error_cause(&self) -> Option<String> {
        self.details.lock().error_cause.clone()
    }

    /// Start time, if started.
    pub fn started(&self) -> Option<SystemTime> {
        self.details.lock().started
    }

    /// Finish time, if finished.
    pub fn finished(&self) -> Option<SystemTime> {
        self.details.lock().finished
    }

    /// Counts one processed event and returns the new total.
    pub fn increment_processed_events(&self) -> u64 {
        self.processed_events.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of events processed so far.
    pub fn processed_events(&self) -> u64 {
        self.processed_events.load(Ordering::Acquire)
    }

    fn transition_from_live(&self, to: JobExecutionState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !JobExecutionState::from_u8(current).is_live() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_only_from_waiting() {
        let exec = JobExecution::new("job");
        assert_eq!(exec.state(), JobExecutionState::Waiting);
        assert!(exec.begin(JobExecutionState::Running));
        assert!(exec.started().is_some());
        assert!(!exec.begin(JobExecutionState::Active));
        assert_eq!(exec.state(), JobExecutionState::Running);
    }

    #[test]
    fn test_cancel_only_while_live() {
        let exec = JobExecution::new("job");
        assert!(!exec.cancel(), "waiting execution cannot be cancelled");
        exec.begin(JobExecutionState::Active);
        assert!(exec.cancel());
        assert_eq!(exec.state(), JobExecutionState::Cancelled);
        assert!(!exec.finish());
    }

    #[test]
    fn test_fail_if_live_keeps_first_outcome() {
        let exec = JobExecution::new("job");
        exec.begin(JobExecutionState::Running);
        assert!(exec.fail_if_live("first"));
        assert!(!exec.fail_if_live("second"));
        assert_eq!(exec.error_cause().as_deref(), Some("first"));

        let cancelled = JobExecution::new("job");
        cancelled.begin(JobExecutionState::Running);
        cancelled.cancel();
        assert!(!cancelled.fail_if_live("late"));
        assert_eq!(cancelled.state(), JobExecutionState::Cancelled);
        assert!(cancelled.error_cause().is_none());
    }

    #[test]
    fn test_failed_snapshot_always_carries_cause() {
        use std::sync::Arc;
        use std::thread;

        for _ in 0..200 {
            let exec = Arc::new(JobExecution::new("job"));
            exec.begin(JobExecutionState::Running);

            let reader = thread::spawn({
                let exec = Arc::clone(&exec);
                move || {
                    loop {
                        let record = exec.record();
                        if record.state == JobExecutionState::Failed {
                            return record.error_cause;
                        }
                        thread::yield_now();
                    }
                }
            });
            assert!(exec.fail_if_live("worker crashed"));
            assert_eq!(reader.join().unwrap().as_deref(), Some("worker crashed"));
        }
    }

    #[test]
    fn test_fail_overrides_state() {
        let exec = JobExecution::new("job");
        exec.begin(JobExecutionState::Running);
        exec.cancel();
        exec.fail("boom");
        assert_eq!(exec.state(), JobExecutionState::Failed);
        assert_eq!(exec.error_cause().as_deref(), Some("boom"));
    }

    #[test]
    fn test_record_round_trip_keeps_counters() {
        let exec = JobExecution::new("job");
        exec.begin(JobExecutionState::Active);
        exec.set_current_task("listen");
        exec.increment_processed_events();
        exec.increment_processed_events();

        let record = exec.record();
        assert_eq!(record.state, JobExecutionState::Active);
        assert_eq!(record.processed_events, 2);

        let restored = JobExecution::from_record(&record);
        assert_eq!(restored.id(), exec.id());
        assert_eq!(restored.current_task().as_deref(), Some("listen"));
        assert_eq!(restored.processed_events(), 2);
    }

    #[test]
    fn test_waiting_records_get_distinct_ids() {
        let a = ExecutionRecord::waiting("job");
        let b = ExecutionRecord::waiting("job");
        assert!(b.id > a.id);
    }
}
