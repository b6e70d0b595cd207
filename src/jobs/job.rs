use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::components::{EventTrigger, TriggerRef};
use crate::error::PipelineError;
use crate::execution::{JobExecution, JobExecutionState};
use crate::pipeline::PipelineConfig;

use super::task::Task;

/// A trigger plus an ordered list of tasks sharing one execution lifecycle.
pub struct Job {
    id: String,
    name: String,
    active: bool,
    fault_tolerant: bool,
    trigger: Option<TriggerRef>,
    tasks: Vec<Task>,
    config: PipelineConfig,
    current: Mutex<Option<Arc<JobExecution>>>,
}

impl Job {
    /// Starts building a job with the given id.
    pub fn builder(id: impl Into<String>) -> JobBuilder {
        JobBuilder::new(id)
    }

    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether earlier failures are resolved once the job runs again.
    pub fn is_fault_tolerant(&self) -> bool {
        self.fault_tolerant
    }

    pub fn trigger(&self) -> Option<&TriggerRef> {
        self.trigger.as_ref()
    }

    /// The trigger, if it is event-driven.
    pub fn event_trigger(&self) -> Option<&dyn EventTrigger> {
        self.trigger.as_ref().and_then(|t| t.as_event_trigger())
    }

    pub fn is_event_triggered(&self) -> bool {
        self.event_trigger().is_some()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State a started execution of this job enters: `ACTIVE` for event triggers, else `RUNNING`.
    pub fn live_state(&self) -> JobExecutionState {
        if self.is_event_triggered() {
            JobExecutionState::Active
        } else {
            JobExecutionState::Running
        }
    }

    /// The execution of the current (or most recent) run.
    pub fn current_execution(&self) -> Option<Arc<JobExecution>> {
        self.current.lock().clone()
    }

    pub(crate) fn set_current_execution(&self, execution: Arc<JobExecution>) {
        *self.current.lock() = Some(execution);
    }

    /// Runs all active tasks in order against `execution`.
    ///
    /// Never returns an error: the outcome is recorded on the execution.
    pub async fn run(&self, execution: Arc<JobExecution>) {
        self.set_current_execution(Arc::clone(&execution));
        execution.begin(self.live_state());

        if execution.is_live() {
            info!(job_id = %self.id, execution = execution.id(), state = %execution.state(), "job started");
            match self.run_tasks(&execution).await {
                Ok(()) => {
                    execution.finish();
                }
                Err(e) => {
                    error!(job_id = %self.id, label = e.as_label(), error = %e, "job failed");
                    execution.fail(e.to_string());
                }
            }
        } else {
            warn!(job_id = %self.id, state = %execution.state(), "execution is not runnable");
        }

        execution.mark_finished();
        info!(job_id = %self.id, execution = execution.id(), state = %execution.state(), "job ended");
    }

    async fn run_tasks(&self, execution: &Arc<JobExecution>) -> Result<(), PipelineError> {
        for task in self.tasks.iter().filter(|t| t.is_active()) {
            if !execution.is_live() {
                break;
            }
            task.run(&self.id, self.trigger.as_ref(), execution, &self.config)
                .await?;
        }
        Ok(())
    }

    /// Requests cancellation of the current run.
    ///
    /// Advisory: running pipelines observe the state change at their next
    /// polling point. Returns `false` if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.current_execution() {
            Some(execution) => execution.cancel(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fault_tolerant", &self.fault_tolerant)
            .field("tasks", &self.tasks)
            .finish()
    }
}

/// Builder for [`Job`] with fluent API.
pub struct JobBuilder {
    id: String,
    name: Option<String>,
    active: bool,
    fault_tolerant: bool,
    trigger: Option<TriggerRef>,
    tasks: Vec<Task>,
    config: PipelineConfig,
}

impl JobBuilder {
    /// Creates a new builder with the given job id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            active: true,
            fault_tolerant: false,
            trigger: None,
            tasks: Vec::new(),
            config: PipelineConfig::default(),
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

    pub fn with_fault_tolerance(mut self, fault_tolerant: bool) -> Self {
        self.fault_tolerant = fault_tolerant;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerRef) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Appends one task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the [`Job`].
    pub fn build(self) -> Job {
        Job {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            active: self.active,
            fault_tolerant: self.fault_tolerant,
            trigger: self.trigger,
            tasks: self.tasks,
            config: self.config,
            current: Mutex::new(None),
        }
    }
}
