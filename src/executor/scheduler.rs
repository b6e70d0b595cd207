use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{ExecutorError, panic_message};
use crate::events::{EventPublisher, JobEvent, JobEventKind, JobTriggerEvent};
use crate::execution::{ExecutionRecord, JobExecution, JobExecutionState};
use crate::jobs::Job;
use crate::repository::{ExecutionRepository, JobRepository};

use super::config::ExecutorConfig;

/// One spawned job run.
struct PendingRun {
    job: Arc<Job>,
    execution: Arc<JobExecution>,
    handle: JoinHandle<()>,
}

/// Process-wide scheduler: reaps finished runs, enforces the slot count,
/// starts waiting executions and routes trigger events.
///
/// All state is owned by the value itself; mutating calls take `&mut self`.
/// Use [`JobExecutor::spawn`] to move it into an actor driven by a fixed tick.
pub struct JobExecutor {
    pub(super) config: ExecutorConfig,
    jobs: Arc<dyn JobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    publisher: Arc<dyn EventPublisher>,
    running: HashMap<String, Arc<Job>>,
    futures: Vec<PendingRun>,
    /// Cancelled once [`shutdown`](Self::shutdown) completes; stops the subscriber listener.
    runtime: CancellationToken,
}

impl JobExecutor {
    pub fn new(
        config: ExecutorConfig,
        jobs: Arc<dyn JobRepository>,
        executions: Arc<dyn ExecutionRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            jobs,
            executions,
            publisher,
            running: HashMap::new(),
            futures: Vec::new(),
            runtime: CancellationToken::new(),
        }
    }

    pub(super) fn with_runtime_token(mut self, token: CancellationToken) -> Self {
        self.runtime = token;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// One scheduling cycle.
    ///
    /// 1. Reap finished runs: persist their final record and publish a state change.
    /// 2. Compute the free slots.
    /// 3. Load every `WAITING` execution, oldest first.
    /// 4. Start them: event-triggered jobs always (once), ordinary jobs while
    ///    slots remain; the rest get a refresh event and stay `WAITING`.
    /// 5. Publish the live state of every running job.
    ///
    /// Failures are logged per item and never abort the cycle.
    pub async fn update(&mut self) {
        self.reap_finished().await;

        let mut free = self
            .config
            .job_queue_size
            .saturating_sub(self.running.len());

        let waiting = match self
            .executions
            .find_in_state(JobExecutionState::Waiting, 0, usize::MAX)
            .await
        {
            Ok(page) => page.items,
            Err(e) => {
                warn!(label = e.as_label(), error = %e, "cannot load waiting executions");
                Vec::new()
            }
        };

        let mut started = HashSet::new();
        for record in waiting {
            let job = match self.jobs.find_by_id(&record.job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    debug!(job_id = %record.job_id, execution = record.id, "job no longer exists; skipped");
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %record.job_id, error = %e, "cannot load job");
                    continue;
                }
            };

            let already_running = self.running.contains_key(job.id());
            if job.is_event_triggered() {
                if already_running {
                    self.publisher
                        .publish(JobEvent::state_refresh(&job).with_execution(record));
                } else {
                    started.insert(job.id().to_owned());
                    self.start(job, &record).await;
                    free = free.saturating_sub(1);
                }
            } else if !already_running && free > 0 {
                started.insert(job.id().to_owned());
                self.start(job, &record).await;
                free -= 1;
            } else {
                self.publisher
                    .publish(JobEvent::state_refresh(&job).with_execution(record));
            }
        }

        for (job_id, job) in &self.running {
            let event = if started.contains(job_id) {
                JobEvent::state_change(job)
            } else {
                JobEvent::state_refresh(job)
            };
            self.publisher.publish(event);
        }
    }

    async fn reap_finished(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.futures)
            .into_iter()
            .partition(|run| run.handle.is_finished());
        self.futures = pending;

        for run in done {
            let PendingRun {
                job,
                execution,
                handle,
            } = run;
            let outcome = handle.await;
            self.settle(&job, &execution, outcome).await;
        }
    }

    /// Records the end of one run.
    async fn settle(
        &mut self,
        job: &Arc<Job>,
        execution: &Arc<JobExecution>,
        outcome: Result<(), JoinError>,
    ) {
        if let Err(e) = outcome {
            let cause = if e.is_panic() {
                format!("job panicked: {}", panic_message(&*e.into_panic()))
            } else {
                "job run aborted".to_owned()
            };
            warn!(job_id = %job.id(), %cause, "job run did not complete");
            execution.fail_if_live(cause);
        }
        if execution.finished().is_none() {
            execution.mark_finished();
        }
        self.running.remove(job.id());

        let state = execution.state();
        if job.is_fault_tolerant()
            && matches!(
                state,
                JobExecutionState::Failed | JobExecutionState::Finished
            )
        {
            self.resolve_failures(job.id()).await;
        }

        let record = execution.record();
        if let Err(e) = self.executions.upsert(record.clone()).await {
            warn!(job_id = %job.id(), error = %e, "cannot persist execution");
        }
        info!(job_id = %job.id(), execution = record.id, state = %state, "job reaped");
        self.publisher
            .publish(JobEvent::state_change(job).with_execution(record));
    }

    /// Supersedes earlier failures of a fault-tolerant job.
    ///
    /// Runs before the latest record is persisted, so that record keeps its state.
    async fn resolve_failures(&self, job_id: &str) {
        match self
            .executions
            .update_all_job_executions_of_job(
                job_id,
                JobExecutionState::Failed,
                JobExecutionState::Resolved,
            )
            .await
        {
            Ok(0) => {}
            Ok(n) => info!(job_id, resolved = n, "earlier failures resolved"),
            Err(e) => warn!(job_id, error = %e, "cannot resolve earlier failures"),
        }
    }

    async fn start(&mut self, job: Arc<Job>, record: &ExecutionRecord) {
        let execution = Arc::new(JobExecution::from_record(record));
        execution.begin(job.live_state());
        job.set_current_execution(Arc::clone(&execution));

        if let Err(e) = self.executions.upsert(execution.record()).await {
            warn!(job_id = %job.id(), error = %e, "cannot persist execution");
        }

        let span = info_span!("job", job_id = %job.id(), execution = execution.id());
        let handle = tokio::spawn({
            let job = Arc::clone(&job);
            let execution = Arc::clone(&execution);
            async move { job.run(execution).await }.instrument(span)
        });

        debug!(job_id = %job.id(), state = %execution.state(), "job submitted");
        self.running.insert(job.id().to_owned(), Arc::clone(&job));
        self.futures.push(PendingRun {
            job,
            execution,
            handle,
        });
    }

    /// Requests cancellation of a running job.
    ///
    /// Blank ids are rejected; unknown ids are ignored. The run winds down
    /// asynchronously and is reaped by a later [`update`](Self::update).
    pub fn cancel(&self, job_id: &str) -> Result<(), ExecutorError> {
        if job_id.trim().is_empty() {
            return Err(ExecutorError::MissingJobId);
        }
        let Some(job) = self.running.get(job_id) else {
            debug!(job_id, "cancel ignored: job is not running");
            return Ok(());
        };
        job.cancel();
        info!(job_id, "job cancellation requested");
        self.publisher.publish(JobEvent::state_change(job));
        Ok(())
    }

    /// Hands an event to a running event-triggered job.
    ///
    /// Returns `false` if the event was dropped: the job is not running, is not
    /// event-triggered, expects another event type, or its queue rejected it.
    pub fn on_job_trigger_event(&self, event: JobTriggerEvent) -> bool {
        let Some(job) = self.running.get(&event.job_id) else {
            debug!(job_id = %event.job_id, "event dropped: job is not running");
            return false;
        };
        let Some(trigger) = job.event_trigger() else {
            warn!(job_id = %event.job_id, "event dropped: job is not event-triggered");
            return false;
        };
        if trigger.event_type() != event.event_type {
            warn!(
                job_id = %event.job_id,
                expected = ?trigger.event_type(),
                got = ?event.event_type,
                "event dropped: unsupported event type"
            );
            return false;
        }
        match trigger.process_event(event.data) {
            Ok(()) => true,
            Err(e) => {
                warn!(job_id = %event.job_id, label = e.as_label(), "event rejected");
                false
            }
        }
    }

    /// Live execution of a running job.
    pub fn job_execution(&self, job_id: &str) -> Option<Arc<JobExecution>> {
        self.running.get(job_id)?.current_execution()
    }

    /// Ids of the running jobs, sorted.
    pub fn running_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.running.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of runs not reaped yet.
    pub fn pending_runs(&self) -> usize {
        self.futures.len()
    }

    /// Cancels every running job and waits up to `grace` for them to end.
    ///
    /// Runs that end in time are reaped as in [`update`](Self::update); the
    /// others are aborted and reported as stuck. Afterwards the subscriber
    /// listener drains the remaining events and releases its subscribers.
    pub async fn shutdown(&mut self) -> Result<(), ExecutorError> {
        self.publisher
            .publish(JobEvent::new(JobEventKind::ShutdownRequested));
        for job in self.running.values() {
            job.cancel();
        }

        let grace = self.config.grace;
        let deadline = Instant::now() + grace;
        let mut stuck = Vec::new();

        for run in std::mem::take(&mut self.futures) {
            let PendingRun {
                job,
                execution,
                mut handle,
            } = run;
            match timeout_at(deadline, &mut handle).await {
                Ok(outcome) => self.settle(&job, &execution, outcome).await,
                Err(_) => {
                    handle.abort();
                    execution.mark_finished();
                    if let Err(e) = self.executions.upsert(execution.record()).await {
                        warn!(job_id = %job.id(), error = %e, "cannot persist execution");
                    }
                    self.running.remove(job.id());
                    stuck.push(job.id().to_owned());
                }
            }
        }

        let result = if stuck.is_empty() {
            self.publisher
                .publish(JobEvent::new(JobEventKind::AllStoppedWithin));
            Ok(())
        } else {
            warn!(?stuck, ?grace, "grace period exceeded");
            self.publisher.publish(
                JobEvent::new(JobEventKind::GraceExceeded).with_reason(format!("stuck: {stuck:?}")),
            );
            Err(ExecutorError::GraceExceeded { grace, stuck })
        };
        self.runtime.cancel();
        result
    }
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("config", &self.config)
            .field("running", &self.running_jobs())
            .field("pending_runs", &self.futures.len())
            .finish()
    }
}
