use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::components::{ActionRef, ProviderRef, RunContext, TriggerRef};
use crate::data::{DataItem, Map};
use crate::error::PipelineError;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::group::ConcurrencyGroup;
use crate::pipeline::partition::{ActionGroup, partition};
use crate::pipeline::queue::DataQueue;

use super::{Components, JobStarter};

/// Starter that dispatches the trigger's item once (or one item per provided datum).
pub struct DefaultJobStarter {
    ctx: RunContext,
    trigger: Option<TriggerRef>,
    provider: Option<ProviderRef>,
    partitions: Vec<ActionGroup>,
    components: Components,
    config: PipelineConfig,
    initial: Arc<DataQueue>,
    callback_set: bool,
}

impl DefaultJobStarter {
    /// Partitions `actions` and wires the trigger's "processing finished" callback.
    ///
    /// The callback goes to the last active action. Without active actions the
    /// trigger is acknowledged right after each dispatch instead.
    pub fn new(
        ctx: RunContext,
        trigger: Option<TriggerRef>,
        provider: Option<ProviderRef>,
        actions: &[ActionRef],
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let partitions = partition(actions)?;

        let callback = trigger.as_ref().and_then(|t| t.finished_callback());
        let last_active = actions.iter().rev().find(|a| a.settings().is_active());
        let callback_set = match (callback, last_active) {
            (Some(callback), Some(action)) => {
                action.settings().set_finished_callback(Some(callback));
                true
            }
            _ => false,
        };

        let initial = if partitions.is_empty() {
            DataQueue::sink()
        } else {
            DataQueue::bounded(config.queue_capacity_clamped())
        };

        Ok(Self {
            components: Components::new(trigger.clone(), provider.clone(), actions),
            ctx,
            trigger,
            provider,
            partitions,
            config: config.clone(),
            initial: Arc::new(initial),
            callback_set,
        })
    }

    /// The queue the first group consumes from.
    pub fn initial_queue(&self) -> &Arc<DataQueue> {
        &self.initial
    }

    /// The computed action groups.
    pub fn partitions(&self) -> &[ActionGroup] {
        &self.partitions
    }

    pub(crate) fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) async fn initialize(&self) -> Result<(), PipelineError> {
        self.components.initialize(&self.ctx).await
    }

    /// Spawns one concurrency group per partition, chaining their queues.
    pub(crate) fn build_groups(&self) -> Vec<ConcurrencyGroup> {
        let last = self.partitions.len().saturating_sub(1);
        let mut input = Arc::clone(&self.initial);
        let mut groups = Vec::with_capacity(self.partitions.len());

        for (index, part) in self.partitions.iter().enumerate() {
            let output = if index == last {
                DataQueue::sink()
            } else {
                DataQueue::bounded(self.config.queue_capacity_clamped())
            };
            let group = ConcurrencyGroup::new(
                format!("{}_{}", self.ctx.job_id, index),
                part.actions.clone(),
                input,
                output,
                part.num_threads,
                Some(Arc::clone(&self.ctx.execution)),
                &self.config,
            );
            input = Arc::clone(group.output());
            groups.push(group);
        }
        groups
    }

    /// Creates an initial item carrying `data` overlaid with the trigger's static data.
    pub(crate) fn initial_item(&self, data: Map) -> DataItem {
        let mut data = data;
        let meta = match &self.trigger {
            Some(trigger) => {
                data.extend(trigger.data());
                trigger.meta_data()
            }
            None => Map::new(),
        };
        DataItem::initial(
            &self.ctx.job_id,
            self.ctx.task_id.as_deref(),
            &meta,
            data,
        )
    }

    /// Hands `item` to the first queue, retrying while the execution is live.
    ///
    /// Returns `false` if the item was abandoned because the execution ended.
    pub(crate) async fn dispatch(&self, item: DataItem) -> bool {
        let ack = if self.callback_set {
            None
        } else {
            self.trigger
                .as_ref()
                .and_then(|t| t.finished_callback())
                .map(|callback| (callback, item.clone()))
        };

        let mut pending = item;
        loop {
            match self.initial.offer(pending, self.config.offer_timeout).await {
                Ok(()) => break,
                Err(back) if self.ctx.execution.is_live() => pending = back,
                Err(_) => {
                    debug!(job_id = %self.ctx.job_id, "execution ended; initial item abandoned");
                    return false;
                }
            }
        }

        if let Some((callback, item)) = ack {
            callback.processing_finished(&item);
        }
        true
    }

    async fn dispatch_provider_data(&self, provider: &ProviderRef) {
        let execution = &self.ctx.execution;
        while execution.is_live() {
            match provider.next().await {
                Ok(Some(data)) => {
                    if !self.dispatch(self.initial_item(data)).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let err = PipelineError::component(provider.id(), e);
                    error!(job_id = %self.ctx.job_id, error = %err, "provider failed");
                    execution.fail_if_live(err.to_string());
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl JobStarter for DefaultJobStarter {
    async fn process(&self) -> Result<Vec<ConcurrencyGroup>, PipelineError> {
        self.initialize().await?;
        let groups = self.build_groups();

        match &self.provider {
            Some(provider) => self.dispatch_provider_data(provider).await,
            None => {
                self.dispatch(self.initial_item(Map::new())).await;
            }
        }
        Ok(groups)
    }

    async fn shutdown(&self) {
        self.components.shutdown(&self.ctx).await;
    }
}
