use std::sync::Arc;

use tracing::{debug, info};

use crate::components::{ActionRef, ProviderRef, RunContext, TriggerRef};
use crate::error::PipelineError;
use crate::execution::JobExecution;
use crate::pipeline::{
    ConcurrencyGroup, DefaultJobStarter, EventTriggeredJobStarter, JobStarter, PipelineConfig,
};

/// One named pipeline run: an optional provider and an ordered action chain.
pub struct Task {
    id: String,
    name: String,
    active: bool,
    provider: Option<ProviderRef>,
    actions: Vec<ActionRef>,
}

impl Task {
    /// Starts building a task with the given id.
    pub fn builder(id: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(id)
    }

    /// Task id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inactive tasks are skipped by [`Job::run`](crate::Job::run).
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Data provider, if any.
    pub fn provider(&self) -> Option<&ProviderRef> {
        self.provider.as_ref()
    }

    /// Actions in declared order.
    pub fn actions(&self) -> &[ActionRef] {
        &self.actions
    }

    /// Runs the pipeline until it is drained and all workers terminated.
    ///
    /// An event trigger selects the event-triggered starter (the call then lasts
    /// as long as the execution stays `ACTIVE`); otherwise the default starter is used.
    /// Components are shut down in every case.
    pub async fn run(
        &self,
        job_id: &str,
        trigger: Option<&TriggerRef>,
        execution: &Arc<JobExecution>,
        config: &PipelineConfig,
    ) -> Result<(), PipelineError> {
        execution.set_current_task(&self.name);
        let ctx = RunContext::new(job_id, Some(self.id.clone()), Arc::clone(execution));

        let starter: Box<dyn JobStarter> = match trigger {
            Some(trigger) if trigger.as_event_trigger().is_some() => Box::new(
                EventTriggeredJobStarter::new(ctx, Arc::clone(trigger), &self.actions, config)?,
            ),
            _ => Box::new(DefaultJobStarter::new(
                ctx,
                trigger.cloned(),
                self.provider.clone(),
                &self.actions,
                config,
            )?),
        };

        info!(job_id, task = %self.name, "task started");
        let result = drive(starter.as_ref(), execution).await;
        starter.shutdown().await;
        debug!(job_id, task = %self.name, state = %execution.state(), "task ended");
        result
    }
}

/// Processes, drains and terminates the pipeline.
async fn drive(starter: &dyn JobStarter, execution: &JobExecution) -> Result<(), PipelineError> {
    let mut groups = starter.process().await?;

    let mut outcome = Ok(());
    for group in &groups {
        if let Err(e) = group.complete().await {
            execution.fail_if_live(e.to_string());
            outcome = Err(e);
            break;
        }
    }

    for group in &groups {
        group.shutdown().await;
    }
    await_all(&mut groups).await;
    outcome
}

/// Polls every group each pass until all report termination.
async fn await_all(groups: &mut [ConcurrencyGroup]) {
    loop {
        let mut terminated = true;
        for group in groups.iter_mut() {
            terminated &= group.await_termination().await;
        }
        if terminated {
            return;
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Builder for [`Task`] with fluent API.
pub struct TaskBuilder {
    id: String,
    name: Option<String>,
    active: bool,
    provider: Option<ProviderRef>,
    actions: Vec<ActionRef>,
}

impl TaskBuilder {
    /// Creates a new builder with the given task id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            active: true,
            provider: None,
            actions: Vec::new(),
        }
    }

    /// Display name (defaults to the id).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_provider(mut self, provider: ProviderRef) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Appends one action.
    pub fn with_action(mut self, action: ActionRef) -> Self {
        self.actions.push(action);
        self
    }

    /// Appends several actions, keeping their order.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Builds the [`Task`].
    pub fn build(self) -> Task {
        Task {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            active: self.active,
            provider: self.provider,
            actions: self.actions,
        }
    }
}
