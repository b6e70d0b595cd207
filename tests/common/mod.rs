#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobvisor::{
    Action, ActionSettings, ComponentError, Connector, ConnectorRef, DataItem, EventPublisher,
    EventQueueSlot, EventTrigger, EventType, ExecutionRecord, ExecutionRepository,
    InMemoryExecutionRepository, JobEvent, JobEventKind, JobExecution, JobExecutionState,
    Lifecycle, Map, Page, ProcessingFinishedCallback, Provider, RepositoryError, RunContext,
    Trigger,
};
use parking_lot::Mutex;
use serde_json::json;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `check` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn data(pairs: &[(&str, serde_json::Value)]) -> Map {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

pub fn num(item: &DataItem, key: &str) -> Option<i64> {
    item.data()?.get(key)?.as_i64()
}

// ---- events ----

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<JobEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, kind: JobEventKind, job_id: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind && e.job_id() == Some(job_id))
            .count()
    }

    pub fn count_kind(&self, kind: JobEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: JobEvent) {
        self.events.lock().push(event);
    }
}

// ---- repositories ----

/// In-memory executions that also record bulk transitions.
#[derive(Default)]
pub struct RecordingExecutions {
    pub inner: InMemoryExecutionRepository,
    pub bulk_calls: Mutex<Vec<(String, JobExecutionState, JobExecutionState)>>,
}

impl RecordingExecutions {
    pub fn state_of(&self, id: u64) -> Option<JobExecutionState> {
        self.inner.get(id).map(|r| r.state)
    }
}

#[async_trait]
impl ExecutionRepository for RecordingExecutions {
    async fn find_in_state(
        &self,
        state: JobExecutionState,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ExecutionRecord>, RepositoryError> {
        self.inner.find_in_state(state, offset, limit).await
    }

    async fn upsert(&self, record: ExecutionRecord) -> Result<(), RepositoryError> {
        self.inner.upsert(record).await
    }

    async fn update_all_job_executions_of_job(
        &self,
        job_id: &str,
        from: JobExecutionState,
        to: JobExecutionState,
    ) -> Result<usize, RepositoryError> {
        self.bulk_calls.lock().push((job_id.to_owned(), from, to));
        self.inner
            .update_all_job_executions_of_job(job_id, from, to)
            .await
    }
}

// ---- components ----

/// Shared, ordered log of lifecycle calls.
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

#[derive(Clone, Copy)]
pub enum Mode {
    /// Forward the item, tagging it with the action id.
    Pass,
    /// Fail every item.
    Fail,
    /// Keep processing until the execution is no longer live.
    Block,
}

pub struct Step {
    id: String,
    mode: Mode,
    settings: ActionSettings,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<DataItem>>,
    journal: Option<Arc<Journal>>,
    connectors: Vec<ConnectorRef>,
    init_delay: Option<Duration>,
}

impl Step {
    pub fn new(id: &str, mode: Mode, threads: usize) -> Self {
        Self {
            id: id.to_owned(),
            mode,
            settings: ActionSettings::new(threads),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            journal: None,
            connectors: Vec::new(),
            init_delay: None,
        }
    }

    pub fn pass(id: &str) -> Arc<Self> {
        Arc::new(Self::new(id, Mode::Pass, 1))
    }

    pub fn with_journal(mut self, journal: &Arc<Journal>) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    pub fn with_connector(mut self, connector: ConnectorRef) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.settings = ActionSettings::new(self.settings.num_threads()).with_active(false);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<DataItem> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Lifecycle for Step {
    async fn initialize(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(journal) = &self.journal {
            journal.push(format!("init:{}", self.id));
        }
        Ok(())
    }

    async fn shutdown(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        if let Some(journal) = &self.journal {
            journal.push(format!("shutdown:{}", self.id));
        }
        Ok(())
    }

    fn connectors(&self) -> Vec<ConnectorRef> {
        self.connectors.clone()
    }
}

#[async_trait]
impl Action for Step {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> &ActionSettings {
        &self.settings
    }

    async fn process(
        &self,
        item: &DataItem,
        execution: &JobExecution,
    ) -> Result<Vec<DataItem>, ComponentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(item.clone());
        if let Some(journal) = &self.journal {
            journal.push(format!("process:{}", self.id));
        }
        match self.mode {
            Mode::Pass => {
                let mut out = item.clone();
                out.data_mut().insert(self.id.clone(), json!(true));
                Ok(vec![out])
            }
            Mode::Fail => Err(ComponentError::fail(format!("{} rejected item", self.id))),
            Mode::Block => {
                while execution.is_live() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(vec![])
            }
        }
    }
}

pub struct Database {
    journal: Arc<Journal>,
}

impl Database {
    pub fn new(journal: &Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
        })
    }
}

#[async_trait]
impl Lifecycle for Database {
    async fn initialize(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        self.journal.push("init:db");
        Ok(())
    }

    async fn shutdown(&self, _ctx: &RunContext) -> Result<(), ComponentError> {
        self.journal.push("shutdown:db");
        Ok(())
    }
}

impl Connector for Database {
    fn id(&self) -> &str {
        "db"
    }
}

/// Scheduled trigger with static data.
pub struct Schedule {
    data: Map,
    acks: Option<Arc<Acks>>,
}

impl Schedule {
    pub fn new(data: Map) -> Arc<Self> {
        Arc::new(Self { data, acks: None })
    }

    pub fn acknowledged(data: Map, acks: &Arc<Acks>) -> Arc<Self> {
        Arc::new(Self {
            data,
            acks: Some(Arc::clone(acks)),
        })
    }
}

impl Lifecycle for Schedule {}

impl Trigger for Schedule {
    fn id(&self) -> &str {
        "schedule"
    }

    fn data(&self) -> Map {
        self.data.clone()
    }

    fn finished_callback(&self) -> Option<Arc<dyn ProcessingFinishedCallback>> {
        self.acks
            .clone()
            .map(|a| a as Arc<dyn ProcessingFinishedCallback>)
    }
}

#[derive(Default)]
pub struct Acks(pub AtomicUsize);

impl Acks {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ProcessingFinishedCallback for Acks {
    fn processing_finished(&self, _item: &DataItem) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Event trigger fed by webhook calls.
pub struct Webhook {
    slot: EventQueueSlot,
    samples: Vec<Map>,
}

impl Webhook {
    pub fn new() -> Arc<Self> {
        Self::with_samples(Vec::new())
    }

    pub fn with_samples(samples: Vec<Map>) -> Arc<Self> {
        Arc::new(Self {
            slot: EventQueueSlot::new(),
            samples,
        })
    }

    pub fn is_listening(&self) -> bool {
        self.slot.is_attached()
    }
}

impl Lifecycle for Webhook {}

impl Trigger for Webhook {
    fn id(&self) -> &str {
        "webhook"
    }

    fn meta_data(&self) -> Map {
        data(&[("source", json!("webhook"))])
    }

    fn as_event_trigger(&self) -> Option<&dyn EventTrigger> {
        Some(self)
    }
}

impl EventTrigger for Webhook {
    fn event_type(&self) -> EventType {
        EventType::WebHook
    }

    fn event_queue(&self) -> &EventQueueSlot {
        &self.slot
    }

    fn simulation_data(&self) -> Vec<Map> {
        self.samples.clone()
    }
}

/// Provider yielding a fixed list of data maps.
pub struct Numbers {
    remaining: Mutex<Vec<Map>>,
}

impl Numbers {
    pub fn new(count: i64) -> Arc<Self> {
        let items = (0..count).rev().map(|n| data(&[("n", json!(n))])).collect();
        Arc::new(Self {
            remaining: Mutex::new(items),
        })
    }
}

impl Lifecycle for Numbers {}

#[async_trait]
impl Provider for Numbers {
    fn id(&self) -> &str {
        "numbers"
    }

    async fn next(&self) -> Result<Option<Map>, ComponentError> {
        Ok(self.remaining.lock().pop())
    }
}
