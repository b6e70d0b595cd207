//! # Concurrency group: a fixed set of workers running one action sub-chain.
//!
//! ```text
//!                   ┌──────────── ConcurrencyGroup ────────────┐
//! input (shared) ──►│ worker-0 ─┐                              │
//!                   │ worker-1 ─┼─► action[0] → … → action[n] ─┼──► output (owned)
//!                   │ worker-N ─┘                              │
//!                   └──────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! 1. `new` spawns the workers (count fixed for the group's lifetime).
//! 2. `complete` waits for an idle input, then flushes every action's buffered items.
//! 3. `shutdown` waits for an idle input, then tells workers to stop polling.
//! 4. `await_termination` joins the workers with a bounded wait.
//!
//! Every wait observes the job execution: once it is no longer live the
//! group stops waiting for input that will never be consumed and
//! `await_termination` reports success immediately.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::components::ActionRef;
use crate::error::PipelineError;
use crate::execution::{JobExecution, JobExecutionState};

use super::config::PipelineConfig;
use super::queue::DataQueue;
use super::worker::{ActionChain, spawn_worker};

/// A pool of workers running the same ordered action sub-list.
pub struct ConcurrencyGroup {
    id: String,
    num_threads: usize,
    input: Arc<DataQueue>,
    output: Arc<DataQueue>,
    chain: Arc<ActionChain>,
    /// `None` when the group is not tied to a job execution's cancellation.
    execution: Option<Arc<JobExecution>>,
    config: PipelineConfig,
    stop: CancellationToken,
    workers: JoinSet<()>,
}

impl ConcurrencyGroup {
    /// Creates the group and spawns its workers. Must be called inside a tokio runtime.
    ///
    /// The worker count is `requested_threads`, or 1 if the first action enforces
    /// single-threading. Without an `execution` the group only terminates once its
    /// workers actually exit.
    pub fn new(
        id: impl Into<String>,
        actions: Vec<ActionRef>,
        input: Arc<DataQueue>,
        output: DataQueue,
        requested_threads: usize,
        execution: Option<Arc<JobExecution>>,
        config: &PipelineConfig,
    ) -> Self {
        let id = id.into();
        let num_threads = match actions.first() {
            Some(first) if first.enforce_single_thread() => 1,
            _ => requested_threads.max(1),
        };

        let chain_execution = execution.clone().unwrap_or_else(|| {
            let detached = JobExecution::new(id.clone());
            detached.begin(JobExecutionState::Running);
            Arc::new(detached)
        });

        let output = Arc::new(output);
        let chain = Arc::new(ActionChain::new(
            actions,
            Arc::clone(&output),
            chain_execution,
            config.offer_timeout,
        ));

        let stop = CancellationToken::new();
        let mut workers = JoinSet::new();
        for index in 0..num_threads {
            spawn_worker(
                &mut workers,
                format!("{id}-{index}"),
                Arc::clone(&chain),
                Arc::clone(&input),
                stop.clone(),
                config.poll_timeout,
            );
        }
        debug!(group = %id, threads = num_threads, "concurrency group started");

        Self {
            id,
            num_threads,
            input,
            output,
            chain,
            execution,
            config: config.clone(),
            stop,
            workers,
        }
    }

    /// Group id (used for worker names).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Worker count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Actions run by this group.
    pub fn actions(&self) -> &[ActionRef] {
        self.chain.actions()
    }

    /// Queue the workers consume from.
    pub fn input(&self) -> &Arc<DataQueue> {
        &self.input
    }

    /// Queue the group produces into.
    pub fn output(&self) -> &Arc<DataQueue> {
        &self.output
    }

    /// Flushes the actions once all input has been handled.
    ///
    /// Items returned by `action[i].complete()` run through `action[i+1..]`, or go
    /// straight to the output if `i` is the last action. Skipped entirely once the
    /// execution is no longer live.
    pub async fn complete(&self) -> Result<(), PipelineError> {
        if !self.wait_for_idle_input().await {
            debug!(group = %self.id, "execution ended; skipping completion");
            return Ok(());
        }

        for (index, action) in self.chain.actions().iter().enumerate() {
            if !self.chain.is_live() {
                break;
            }
            let items = action
                .complete()
                .await
                .map_err(|e| PipelineError::component(action.id(), e))?;
            if !items.is_empty() {
                debug!(group = %self.id, action = action.id(), count = items.len(), "flushing completed items");
                self.chain.run(index + 1, items).await?;
            }
        }
        Ok(())
    }

    /// Waits for an idle input queue, then stops the workers from polling further input.
    pub async fn shutdown(&self) {
        self.wait_for_idle_input().await;
        self.stop.cancel();
    }

    /// Bounded wait for all workers to exit.
    ///
    /// If the execution is no longer live the workers are detached and `true` is
    /// returned at once; workers still inside an action finish that call on their own.
    pub async fn await_termination(&mut self) -> bool {
        if self.workers.is_empty() {
            return true;
        }

        if let Some(execution) = &self.execution {
            if !execution.is_live() {
                self.stop.cancel();
                self.workers.detach_all();
                debug!(group = %self.id, state = %execution.state(), "forced termination");
                return true;
            }
        }

        let deadline = Instant::now() + self.config.termination_wait;
        loop {
            match timeout_at(deadline, self.workers.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(e))) => {
                    warn!(group = %self.id, error = %e, "worker task aborted");
                }
                Ok(None) => return true,
                Err(_) => return self.workers.is_empty(),
            }
        }
    }

    /// Waits until the input queue is settled. Returns `false` if the execution ended first.
    async fn wait_for_idle_input(&self) -> bool {
        loop {
            if !self.chain.is_live() {
                return false;
            }
            if self.input.is_settled() {
                return true;
            }
            self.input
                .wait_settled(self.config.idle_check_interval)
                .await;
        }
    }
}

impl std::fmt::Debug for ConcurrencyGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.chain.actions().iter().map(|a| a.id()).collect();
        f.debug_struct("ConcurrencyGroup")
            .field("id", &self.id)
            .field("num_threads", &self.num_threads)
            .field("actions", &ids)
            .finish()
    }
}
