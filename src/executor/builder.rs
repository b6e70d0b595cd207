use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::Bus;
use crate::repository::{ExecutionRepository, JobRepository};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::config::ExecutorConfig;
use super::scheduler::JobExecutor;

/// Builder wiring a [`JobExecutor`] to an event [`Bus`] and a [`SubscriberSet`].
pub struct JobExecutorBuilder {
    config: ExecutorConfig,
    jobs: Arc<dyn JobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl JobExecutorBuilder {
    pub fn new(
        config: ExecutorConfig,
        jobs: Arc<dyn JobRepository>,
        executions: Arc<dyn ExecutionRepository>,
    ) -> Self {
        Self {
            config,
            jobs,
            executions,
            subscribers: Vec::new(),
        }
    }

    /// Subscribers receiving every executor event.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the executor and spawns the subscriber listener.
    ///
    /// The listener lives until the executor's [`shutdown`](JobExecutor::shutdown)
    /// completes. Must be called within a Tokio runtime.
    pub fn build(self) -> JobExecutor {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();
        spawn_listener(&bus, subs, runtime_token.clone());

        JobExecutor::new(self.config, self.jobs, self.executions, Arc::new(bus))
            .with_runtime_token(runtime_token)
    }
}

fn spawn_listener(bus: &Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => subs.emit(Arc::new(ev)),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "subscriber listener lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => {
                    // events published before the executor stopped
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => subs.emit(Arc::new(ev)),
                            Err(TryRecvError::Lagged(n)) => {
                                warn!(skipped = n, "subscriber listener lagged")
                            }
                            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                        }
                    }
                    break;
                }
            }
        }
        drop(rx);
        debug!(subscribers = subs.len(), "subscriber listener stopped");
        subs.shutdown().await;
    });
}
