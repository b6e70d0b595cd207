use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::components::{ActionRef, RunContext, TriggerRef};
use crate::data::Map;
use crate::error::PipelineError;
use crate::execution::JobExecutionState;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::group::ConcurrencyGroup;

use super::{DefaultJobStarter, JobStarter};

/// Starter that keeps the job `ACTIVE` and dispatches one item per trigger event.
///
/// `process` returns only once the execution leaves `ACTIVE` (usually through
/// cancellation). Events are taken from a bounded queue attached to the
/// trigger's [`EventQueueSlot`](crate::EventQueueSlot); its capacity is the
/// first group's worker count (1 without active actions).
pub struct EventTriggeredJobStarter {
    inner: DefaultJobStarter,
    trigger: TriggerRef,
}

impl EventTriggeredJobStarter {
    /// Fails if `trigger` is not an event trigger.
    pub fn new(
        ctx: RunContext,
        trigger: TriggerRef,
        actions: &[ActionRef],
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        if trigger.as_event_trigger().is_none() {
            return Err(PipelineError::configuration(format!(
                "trigger '{}' is not event-driven",
                trigger.id()
            )));
        }
        let inner = DefaultJobStarter::new(ctx, Some(trigger.clone()), None, actions, config)?;
        Ok(Self { inner, trigger })
    }

    /// The underlying wiring.
    pub fn wiring(&self) -> &DefaultJobStarter {
        &self.inner
    }

    async fn listen(&self, events: &mut mpsc::Receiver<Map>) {
        let ctx = self.inner.context();
        let poll_timeout = self.inner.config().poll_timeout;

        while ctx.execution.state() == JobExecutionState::Active {
            match tokio::time::timeout(poll_timeout, events.recv()).await {
                Err(_) => continue,
                Ok(None) => {
                    debug!(job_id = %ctx.job_id, "event queue detached; leaving event loop");
                    break;
                }
                Ok(Some(data)) => {
                    debug!(job_id = %ctx.job_id, "job triggered by event");
                    let item = self.inner.initial_item(data);
                    if self.inner.dispatch(item).await {
                        ctx.execution.increment_processed_events();
                    }
                }
            }
        }
    }
}

#[async_trait]
impl JobStarter for EventTriggeredJobStarter {
    async fn process(&self) -> Result<Vec<ConcurrencyGroup>, PipelineError> {
        let Some(events) = self.trigger.as_event_trigger() else {
            return Err(PipelineError::configuration("trigger is not event-driven"));
        };

        let capacity = self
            .inner
            .partitions()
            .first()
            .map_or(1, |part| part.num_threads);
        let mut rx = events.event_queue().attach(capacity);

        if let Err(e) = self.inner.initialize().await {
            events.event_queue().detach();
            return Err(e);
        }
        let groups = self.inner.build_groups();

        self.listen(&mut rx).await;
        events.event_queue().detach();
        Ok(groups)
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}
