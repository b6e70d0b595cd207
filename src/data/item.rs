use std::time::{SystemTime, UNIX_EPOCH};

pub use serde_json::Value;

/// JSON object used for item sections and trigger data.
pub type Map = serde_json::Map<String, Value>;

/// Reserved keys of a [`DataItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKey {
    /// Top-level metadata section.
    Meta,
    /// Top-level payload section.
    Data,
    /// Meta: id of the job that produced the item.
    JobId,
    /// Meta: id of the task that produced the item.
    TaskId,
    /// Meta: creation time in epoch milliseconds.
    Timestamp,
    /// Meta: set on items produced by a dry run.
    Simulation,
    /// Meta: human-readable comment attached during a dry run.
    SimulationLog,
}

impl DataKey {
    /// Returns the key as it appears in the item.
    pub const fn as_str(self) -> &'static str {
        match self {
            DataKey::Meta => "meta",
            DataKey::Data => "data",
            DataKey::JobId => "jobId",
            DataKey::TaskId => "taskId",
            DataKey::Timestamp => "timestamp",
            DataKey::Simulation => "simulation",
            DataKey::SimulationLog => "simulationLog",
        }
    }
}

/// The unit of data flowing through an action chain.
///
/// Items are values: actions receive a borrowed item and return new ones.
/// Once an item is pushed to a queue the producer no longer has access to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataItem(Map);

impl DataItem {
    /// Creates an empty item (no `meta`, no `data`).
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates the first item of a pipeline run.
    ///
    /// `meta` receives the job id, the task id (if any), the current timestamp
    /// and then the trigger's metadata (trigger entries win on conflict).
    #[must_use]
    pub fn initial(job_id: &str, task_id: Option<&str>, trigger_meta: &Map, data: Map) -> Self {
        let mut meta = Map::new();
        meta.insert(DataKey::JobId.as_str().into(), Value::from(job_id));
        if let Some(task_id) = task_id {
            meta.insert(DataKey::TaskId.as_str().into(), Value::from(task_id));
        }
        meta.insert(DataKey::Timestamp.as_str().into(), Value::from(epoch_millis()));
        for (k, v) in trigger_meta {
            meta.insert(k.clone(), v.clone());
        }

        let mut item = Map::new();
        item.insert(DataKey::Meta.as_str().into(), Value::Object(meta));
        item.insert(DataKey::Data.as_str().into(), Value::Object(data));
        Self(item)
    }

    /// True if the item carries no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the `meta` section, if present and an object.
    pub fn meta(&self) -> Option<&Map> {
        self.section(DataKey::Meta)
    }

    /// Returns the `data` section, if present and an object.
    pub fn data(&self) -> Option<&Map> {
        self.section(DataKey::Data)
    }

    /// Returns the `meta` section, creating it if missing.
    pub fn meta_mut(&mut self) -> &mut Map {
        self.section_mut(DataKey::Meta)
    }

    /// Returns the `data` section, creating it if missing.
    pub fn data_mut(&mut self) -> &mut Map {
        self.section_mut(DataKey::Data)
    }

    /// Job id stored in `meta`, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.meta()?.get(DataKey::JobId.as_str())?.as_str()
    }

    /// Returns a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts a top-level value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Marks the item as produced by a dry run.
    pub fn mark_simulation(&mut self) {
        self.meta_mut()
            .insert(DataKey::Simulation.as_str().into(), Value::Bool(true));
    }

    /// True if the item was produced by a dry run.
    #[must_use]
    pub fn is_simulation(&self) -> bool {
        self.meta()
            .and_then(|m| m.get(DataKey::Simulation.as_str()))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Attaches a dry-run comment to the item.
    pub fn set_simulation_log(&mut self, comment: impl Into<String>) {
        self.meta_mut().insert(
            DataKey::SimulationLog.as_str().into(),
            Value::String(comment.into()),
        );
    }

    /// Dry-run comment, if any.
    pub fn simulation_log(&self) -> Option<&str> {
        self.meta()?.get(DataKey::SimulationLog.as_str())?.as_str()
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map {
        &self.0
    }

    /// Unwraps into the underlying JSON object.
    pub fn into_map(self) -> Map {
        self.0
    }

    fn section(&self, key: DataKey) -> Option<&Map> {
        self.0.get(key.as_str()).and_then(Value::as_object)
    }

    fn section_mut(&mut self, key: DataKey) -> &mut Map {
        let slot = self
            .0
            .entry(key.as_str())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("section was just replaced by an object"),
        }
    }
}

impl From<Map> for DataItem {
    fn from(map: Map) -> Self {
        Self(map)
    }
}

impl From<DataItem> for Value {
    fn from(item: DataItem) -> Self {
        Value::Object(item.0)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
