//! # Worker loop of a concurrency group.
//!
//! Every worker repeatedly polls the group's input queue, runs the group's
//! action chain on the item and pushes the results to the output queue.
//! Errors leave the loop as a [`PipelineError`]; the supervising wrapper in
//! [`spawn_worker`] records them (and panics) as the execution's failure.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, trace};

use crate::components::{ActionRef, ProcessingFinishedCallback};
use crate::data::DataItem;
use crate::error::{PipelineError, panic_message};
use crate::execution::JobExecution;

use super::queue::DataQueue;

/// The ordered actions of one group plus the queue their output goes to.
pub(crate) struct ActionChain {
    actions: Vec<ActionRef>,
    output: Arc<DataQueue>,
    execution: Arc<JobExecution>,
    offer_timeout: Duration,
}

impl ActionChain {
    pub(crate) fn new(
        actions: Vec<ActionRef>,
        output: Arc<DataQueue>,
        execution: Arc<JobExecution>,
        offer_timeout: Duration,
    ) -> Self {
        Self {
            actions,
            output,
            execution,
            offer_timeout,
        }
    }

    pub(crate) fn actions(&self) -> &[ActionRef] {
        &self.actions
    }

    pub(crate) fn execution(&self) -> &Arc<JobExecution> {
        &self.execution
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.execution.is_live()
    }

    /// Runs `items` through the actions starting at index `from` and pushes the result.
    ///
    /// Each action receives the whole output batch of its predecessor. An empty
    /// batch stops the chain. With `from == len` the items are pushed unchanged.
    pub(crate) async fn run(&self, from: usize, items: Vec<DataItem>) -> Result<(), PipelineError> {
        let mut batch = items;
        let mut callbacks: Vec<(Arc<dyn ProcessingFinishedCallback>, Vec<DataItem>)> = Vec::new();

        for action in self.actions.iter().skip(from) {
            if let Some(callback) = action.settings().finished_callback() {
                callbacks.push((callback, batch.clone()));
            }

            let mut next = Vec::new();
            for item in &batch {
                trace!(action = action.id(), "processing item");
                let produced = action
                    .process(item, &self.execution)
                    .await
                    .map_err(|e| PipelineError::component(action.id(), e))?;
                next.extend(produced);
            }

            batch = next;
            if batch.is_empty() {
                break;
            }
        }

        if self.push(batch).await {
            for (callback, entered) in callbacks {
                for item in &entered {
                    callback.processing_finished(item);
                }
            }
        }
        Ok(())
    }

    /// Pushes items to the output queue, retrying while the execution is live.
    ///
    /// Returns `false` if items were abandoned because the execution ended.
    async fn push(&self, items: Vec<DataItem>) -> bool {
        for item in items {
            let mut pending = item;
            loop {
                match self.output.offer(pending, self.offer_timeout).await {
                    Ok(()) => break,
                    Err(back) if self.is_live() => pending = back,
                    Err(_) => {
                        debug!(
                            state = %self.execution.state(),
                            "execution ended; abandoning output"
                        );
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Spawns one supervised worker into `set`.
pub(crate) fn spawn_worker(
    set: &mut JoinSet<()>,
    name: String,
    chain: Arc<ActionChain>,
    input: Arc<DataQueue>,
    stop: CancellationToken,
    poll_timeout: Duration,
) {
    let execution = Arc::clone(chain.execution());
    let span = tracing::debug_span!("worker", worker = %name);

    set.spawn(
        async move {
            let outcome = AssertUnwindSafe(work(chain, input, stop, poll_timeout))
                .catch_unwind()
                .await;

            let err = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(payload) => PipelineError::WorkerPanicked {
                    worker: name,
                    info: panic_message(&*payload),
                },
            };

            error!(label = err.as_label(), error = %err, "worker failed");
            if !execution.fail_if_live(err.to_string()) {
                debug!(state = %execution.state(), "execution already ended; failure not recorded");
            }
        }
        .instrument(span),
    );
}

async fn work(
    chain: Arc<ActionChain>,
    input: Arc<DataQueue>,
    stop: CancellationToken,
    poll_timeout: Duration,
) -> Result<(), PipelineError> {
    while chain.is_live() {
        let polled = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            polled = input.poll(poll_timeout) => polled,
        };

        let Some((item, _in_flight)) = polled else {
            continue;
        };
        if item.is_empty() {
            continue;
        }
        chain.run(0, vec![item]).await?;
    }
    Ok(())
}
