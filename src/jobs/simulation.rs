//! Dry runs: push a handful of items through a task's chain without workers.
//!
//! Every action runs sequentially in the caller's task on at most
//! `simulation_limit` items, and every stage's output is captured as a
//! [`StageResult`]. Failures are recorded on the stage instead of aborting
//! the run, so later stages show what they would receive.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::components::{ActionRef, RunContext, TriggerRef};
use crate::data::{DataItem, Map};
use crate::error::PipelineError;
use crate::execution::JobExecution;
use crate::pipeline::{Components, PipelineConfig};

use super::job::Job;
use super::task::Task;

/// Output of one action during a dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    /// Id of the simulated action.
    pub action_id: String,
    /// Items the action produced (or a single placeholder item).
    pub items: Vec<DataItem>,
    /// Failure raised by the action, if any.
    pub error: Option<String>,
}

/// Dry-run result of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSimulation {
    pub task_id: String,
    /// Items fed to the first action.
    pub input: Vec<DataItem>,
    /// One entry per declared action, in order.
    pub stages: Vec<StageResult>,
}

fn placeholder(comment: impl Into<String>) -> DataItem {
    let mut item = DataItem::new();
    item.mark_simulation();
    item.set_simulation_log(comment);
    item
}

fn limit(items: &mut Vec<DataItem>, max: Option<usize>) {
    if let Some(max) = max {
        items.truncate(max);
    }
}

impl Task {
    /// Simulates this task. Components are initialized and shut down as in a real run.
    pub async fn simulate(
        &self,
        job_id: &str,
        trigger: Option<&TriggerRef>,
        execution: &Arc<JobExecution>,
        config: &PipelineConfig,
    ) -> Result<TaskSimulation, PipelineError> {
        let ctx = RunContext::new(job_id, Some(self.id().to_owned()), Arc::clone(execution));
        let components = Components::new(trigger.cloned(), self.provider().cloned(), self.actions());

        if let Err(e) = components.initialize(&ctx).await {
            components.shutdown(&ctx).await;
            return Err(e);
        }
        let result = self.simulate_chain(&ctx, trigger, config).await;
        components.shutdown(&ctx).await;
        result
    }

    async fn simulate_chain(
        &self,
        ctx: &RunContext,
        trigger: Option<&TriggerRef>,
        config: &PipelineConfig,
    ) -> Result<TaskSimulation, PipelineError> {
        let max = config.simulation_limit();
        let input = self.simulation_input(ctx, trigger, max).await?;
        debug!(job_id = %ctx.job_id, task = %self.name(), items = input.len(), "simulating task");

        let mut stages = Vec::with_capacity(self.actions().len());
        let mut current = input.clone();
        for action in self.actions() {
            let stage = simulate_action(action, &current, &ctx.execution, max).await;
            if action.settings().is_active() && !current.is_empty() {
                current = stage.items.clone();
            }
            stages.push(stage);
        }

        Ok(TaskSimulation {
            task_id: self.id().to_owned(),
            input,
            stages,
        })
    }

    async fn simulation_input(
        &self,
        ctx: &RunContext,
        trigger: Option<&TriggerRef>,
        max: Option<usize>,
    ) -> Result<Vec<DataItem>, PipelineError> {
        let (static_data, meta) = match trigger {
            Some(t) => (t.data(), t.meta_data()),
            None => (Map::new(), Map::new()),
        };
        let seed = |mut data: Map| {
            data.extend(static_data.clone());
            let mut item = DataItem::initial(&ctx.job_id, ctx.task_id.as_deref(), &meta, data);
            item.mark_simulation();
            item
        };

        let mut raw = Vec::new();
        if let Some(events) = trigger.and_then(|t| t.as_event_trigger()) {
            raw = events.simulation_data();
        } else if let Some(provider) = self.provider() {
            while max.is_none_or(|m| raw.len() < m) {
                match provider.next().await {
                    Ok(Some(data)) => raw.push(data),
                    Ok(None) => break,
                    Err(e) => return Err(PipelineError::component(provider.id(), e)),
                }
            }
        } else {
            raw.push(Map::new());
        }

        let mut items: Vec<DataItem> = raw.into_iter().map(seed).collect();
        limit(&mut items, max);
        Ok(items)
    }
}

async fn simulate_action(
    action: &ActionRef,
    input: &[DataItem],
    execution: &JobExecution,
    max: Option<usize>,
) -> StageResult {
    let mut stage = StageResult {
        action_id: action.id().to_owned(),
        items: Vec::new(),
        error: None,
    };

    if !action.settings().is_active() {
        stage.items.push(placeholder(format!(
            "action '{}' is inactive; input passed through",
            action.id()
        )));
        return stage;
    }
    if input.is_empty() {
        stage
            .items
            .push(placeholder(format!("action '{}' received no input", action.id())));
        return stage;
    }

    let take = max.unwrap_or(input.len());
    for item in input.iter().take(take) {
        match action.process(item, execution).await {
            Ok(out) => stage.items.extend(out),
            Err(e) => {
                warn!(action = action.id(), error = %e, "simulated action failed");
                stage.error = Some(e.to_string());
                break;
            }
        }
    }
    if stage.error.is_none() {
        match action.complete().await {
            Ok(out) => stage.items.extend(out),
            Err(e) => stage.error = Some(e.to_string()),
        }
    }

    limit(&mut stage.items, max);
    for item in &mut stage.items {
        item.mark_simulation();
    }
    stage
}

impl Job {
    /// Dry-runs every active task and returns one [`TaskSimulation`] per task.
    ///
    /// Uses a private execution so the job's real runs are unaffected.
    pub async fn simulate(&self) -> Result<Vec<TaskSimulation>, PipelineError> {
        let execution = Arc::new(JobExecution::new(self.id()));
        execution.begin(self.live_state());

        let mut results = Vec::new();
        for task in self.tasks().iter().filter(|t| t.is_active()) {
            let sim = task
                .simulate(self.id(), self.trigger(), &execution, self.config())
                .await?;
            results.push(sim);
        }
        execution.finish();
        execution.mark_finished();
        Ok(results)
    }
}
