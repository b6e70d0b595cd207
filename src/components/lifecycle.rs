use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ComponentError;
use crate::execution::JobExecution;

/// Identifies the run a lifecycle call belongs to.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Id of the running job.
    pub job_id: String,
    /// Id of the running task (absent for job-level components such as the trigger).
    pub task_id: Option<String>,
    /// The execution being run.
    pub execution: Arc<JobExecution>,
}

impl RunContext {
    /// Creates a context for the given job/task/execution.
    pub fn new(
        job_id: impl Into<String>,
        task_id: Option<String>,
        execution: Arc<JobExecution>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            task_id,
            execution,
        }
    }
}

/// Hooks invoked once per run around the processing window.
///
/// Components declare their external dependencies through [`Lifecycle::connectors`];
/// the runtime initializes each declared connector once per run before the
/// components that use it, and shuts it down after them.
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
    /// Prepares the component for a run.
    async fn initialize(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Releases run resources. Called even if the run failed.
    async fn shutdown(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Connectors this component depends on.
    fn connectors(&self) -> Vec<ConnectorRef> {
        Vec::new()
    }
}

/// External resource (database, broker, remote file system) used by components.
pub trait Connector: Lifecycle {
    /// Stable id (for logs).
    fn id(&self) -> &str;
}

/// Shared connector handle.
pub type ConnectorRef = Arc<dyn Connector>;
