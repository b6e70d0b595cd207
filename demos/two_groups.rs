//! # Example: two_groups
//!
//! One job whose task splits numbers and sums them in two concurrency groups,
//! run by a spawned executor with the built-in `LogWriter` subscriber.
//!
//! Demonstrates how to:
//! - Implement a [`Provider`] and two [`Action`]s with different thread counts.
//! - Register the job and queue an execution in the in-memory repositories.
//! - Drive the executor through its [`ExecutorHandle`] and shut it down.
//!
//! ## Flow
//! ```text
//! Numbers ──► [initial] ──► group 0: Square (4 workers) ──► [queue] ──► group 1: Total (1 worker) ──► sink
//!                                                                               │
//!                                                                   complete() ─┘ emits the sum
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example two_groups
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobvisor::{
    Action, ActionSettings, ComponentError, DataItem, ExecutorConfig, InMemoryExecutionRepository,
    InMemoryJobRepository, Job, JobExecution, JobExecutionState, JobExecutorBuilder, Lifecycle,
    LogWriter, Map, Provider, Subscribe, Task,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Yields `{"n": 1}` .. `{"n": 10}`.
struct Numbers(Mutex<std::ops::RangeInclusive<i64>>);

impl Lifecycle for Numbers {}

#[async_trait]
impl Provider for Numbers {
    fn id(&self) -> &str {
        "numbers"
    }

    async fn next(&self) -> Result<Option<Map>, ComponentError> {
        Ok(self.0.lock().next().map(|n| {
            let mut data = Map::new();
            data.insert("n".into(), json!(n));
            data
        }))
    }
}

struct Square {
    settings: ActionSettings,
}

impl Lifecycle for Square {}

#[async_trait]
impl Action for Square {
    fn id(&self) -> &str {
        "square"
    }

    fn settings(&self) -> &ActionSettings {
        &self.settings
    }

    async fn process(&self, item: &DataItem, _: &JobExecution) -> Result<Vec<DataItem>, ComponentError> {
        let n = item
            .data()
            .and_then(|d| d.get("n"))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ComponentError::fail("missing 'n'"))?;
        let mut out = item.clone();
        out.data_mut().insert("square".into(), json!(n * n));
        Ok(vec![out])
    }
}

/// Buffers every square and emits the sum on completion.
struct Total {
    settings: ActionSettings,
    sum: Mutex<i64>,
}

impl Lifecycle for Total {}

#[async_trait]
impl Action for Total {
    fn id(&self) -> &str {
        "total"
    }

    fn settings(&self) -> &ActionSettings {
        &self.settings
    }

    async fn process(&self, item: &DataItem, _: &JobExecution) -> Result<Vec<DataItem>, ComponentError> {
        let square = item.data().and_then(|d| d.get("square")).and_then(|v| v.as_i64());
        *self.sum.lock() += square.unwrap_or(0);
        Ok(Vec::new())
    }

    async fn complete(&self) -> Result<Vec<DataItem>, ComponentError> {
        let sum = *self.sum.lock();
        println!("[total] sum of squares = {sum}");
        Ok(Vec::new())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Describe the job: a provider feeding two groups (4 workers, then 1)
    let task = Task::builder("squares")
        .with_provider(Arc::new(Numbers(Mutex::new(1..=10))))
        .with_action(Arc::new(Square {
            settings: ActionSettings::new(4),
        }))
        .with_action(Arc::new(Total {
            settings: ActionSettings::new(1),
            sum: Mutex::new(0),
        }))
        .build();

    // 2. Register it and queue one execution
    let jobs = Arc::new(InMemoryJobRepository::new());
    let executions = Arc::new(InMemoryExecutionRepository::new());
    jobs.insert(Job::builder("sum-of-squares").with_task(task).build());
    let queued = executions.enqueue("sum-of-squares");

    // 3. Spawn the executor with a log subscriber
    let config = ExecutorConfig {
        tick: Duration::from_millis(100),
        ..ExecutorConfig::default()
    };
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let handle = JobExecutorBuilder::new(config, jobs, executions.clone())
        .with_subscribers(subscribers)
        .build()
        .spawn(CancellationToken::new());

    // 4. Wait for the run to be reaped
    loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = executions.get(queued.id).map(|r| r.state);
        if state.is_some_and(JobExecutionState::is_terminal) {
            println!("[main] execution {} ended as {:?}", queued.id, state);
            break;
        }
    }

    // 5. Stop the executor
    handle.shutdown().await?;
    Ok(())
}
