//! # Executor actor and its handle.
//!
//! [`JobExecutor::spawn`] moves the executor into a single task that owns all
//! scheduling state. Everything else talks to it through an [`ExecutorHandle`].
//!
//! ```text
//!  ExecutorHandle ──cmd──► mpsc ──► ┌──────────── actor loop ────────────┐
//!   (cloneable)                     │ select! {                          │
//!                                   │   token.cancelled()  → shutdown    │
//!                                   │   OS signal          → shutdown    │
//!                                   │   tick               → update()    │
//!                                   │   command            → reply       │
//!                                   │ }                                  │
//!                                   └────────────────────────────────────┘
//! ```
//!
//! Queries are answered from the actor's own state, so they reflect the last
//! completed `update()` cycle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::ExecutorError;
use crate::events::JobTriggerEvent;
use crate::execution::JobExecution;

use super::scheduler::JobExecutor;
use super::signal;

enum Command {
    Update {
        reply: oneshot::Sender<()>,
    },
    Cancel {
        job_id: String,
        reply: oneshot::Sender<Result<(), ExecutorError>>,
    },
    Trigger {
        event: JobTriggerEvent,
        reply: Option<oneshot::Sender<bool>>,
    },
    Execution {
        job_id: String,
        reply: oneshot::Sender<Option<Arc<JobExecution>>>,
    },
    Running {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<(), ExecutorError>>,
    },
}

/// Cloneable handle to a spawned [`JobExecutor`].
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<Command>,
    token: CancellationToken,
}

impl ExecutorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ExecutorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ExecutorError::Closed)?;
        rx.await.map_err(|_| ExecutorError::Closed)
    }

    /// Runs one scheduling cycle now instead of waiting for the next tick.
    pub async fn update(&self) -> Result<(), ExecutorError> {
        self.request(|reply| Command::Update { reply }).await
    }

    /// Requests cancellation of a running job; see [`JobExecutor::cancel`].
    pub async fn cancel(&self, job_id: impl Into<String>) -> Result<(), ExecutorError> {
        let job_id = job_id.into();
        self.request(|reply| Command::Cancel { job_id, reply })
            .await?
    }

    /// Routes an event and reports whether it was accepted.
    pub async fn trigger(&self, event: JobTriggerEvent) -> Result<bool, ExecutorError> {
        self.request(|reply| Command::Trigger {
            event,
            reply: Some(reply),
        })
        .await
    }

    /// Routes an event without waiting (fire-and-forget).
    ///
    /// Fails with [`ExecutorError::Full`] when the command queue is at capacity.
    pub fn try_trigger(&self, event: JobTriggerEvent) -> Result<(), ExecutorError> {
        self.tx
            .try_send(Command::Trigger { event, reply: None })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ExecutorError::Full,
                mpsc::error::TrySendError::Closed(_) => ExecutorError::Closed,
            })
    }

    /// Live execution of a running job.
    pub async fn job_execution(
        &self,
        job_id: impl Into<String>,
    ) -> Result<Option<Arc<JobExecution>>, ExecutorError> {
        let job_id = job_id.into();
        self.request(|reply| Command::Execution { job_id, reply })
            .await
    }

    /// Ids of the running jobs, sorted.
    pub async fn running_jobs(&self) -> Result<Vec<String>, ExecutorError> {
        self.request(|reply| Command::Running { reply }).await
    }

    /// Stops the actor: cancels running jobs and waits up to the grace period.
    pub async fn shutdown(&self) -> Result<(), ExecutorError> {
        self.request(|reply| Command::Shutdown { reply }).await?
    }

    /// Token that stops the actor when cancelled (without reporting the outcome).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobExecutor {
    /// Moves the executor into an actor task ticking every `config.tick`.
    ///
    /// Cancelling `token` (or an OS signal, if enabled) stops the actor after
    /// a graceful [`shutdown`](JobExecutor::shutdown). Must be called within a
    /// Tokio runtime.
    pub fn spawn(self, token: CancellationToken) -> ExecutorHandle {
        let (tx, rx) = mpsc::channel(self.config.command_capacity_clamped());
        let handle = ExecutorHandle {
            tx,
            token: token.clone(),
        };
        tokio::spawn(self.run(rx, token).instrument(info_span!("executor")));
        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, token: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.tick_clamped());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let signal = signal::termination(self.config.handle_os_signals);
        tokio::pin!(signal);

        info!(slots = self.config.job_queue_size, "executor started");
        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = &mut signal => break,
                Some(cmd) = rx.recv() => {
                    if let Some(reply) = self.handle(cmd).await {
                        shutdown_reply = Some(reply);
                        break;
                    }
                }
                _ = tick.tick() => self.update().await,
            }
        }

        rx.close();
        let result = self.shutdown().await;
        if let Err(e) = &result {
            warn!(label = e.as_label(), error = %e.as_message(), "executor stopped with stuck jobs");
        } else {
            info!("executor stopped");
        }
        token.cancel();
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(result);
        }
    }

    /// Serves one command; returns the reply slot of a shutdown request.
    async fn handle(
        &mut self,
        cmd: Command,
    ) -> Option<oneshot::Sender<Result<(), ExecutorError>>> {
        match cmd {
            Command::Update { reply } => {
                self.update().await;
                let _ = reply.send(());
            }
            Command::Cancel { job_id, reply } => {
                let _ = reply.send(self.cancel(&job_id));
            }
            Command::Trigger { event, reply } => {
                let accepted = self.on_job_trigger_event(event);
                if let Some(reply) = reply {
                    let _ = reply.send(accepted);
                }
            }
            Command::Execution { job_id, reply } => {
                let _ = reply.send(self.job_execution(&job_id));
            }
            Command::Running { reply } => {
                let _ = reply.send(self.running_jobs());
            }
            Command::Shutdown { reply } => {
                debug!("shutdown requested through handle");
                return Some(reply);
            }
        }
        None
    }
}
