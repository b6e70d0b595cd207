use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::data::DataItem;
use crate::error::ComponentError;
use crate::execution::JobExecution;

use super::Lifecycle;

/// Notified once an item has fully left the pipeline.
///
/// Used by event-sourced triggers that need acknowledgement semantics.
pub trait ProcessingFinishedCallback: Send + Sync + 'static {
    /// Called with the item as it entered the action that carries the callback.
    fn processing_finished(&self, item: &DataItem);
}

/// Configuration and runtime slots shared by every action.
///
/// Concrete actions embed one and return it from [`Action::settings`].
pub struct ActionSettings {
    active: bool,
    num_threads: usize,
    callback: RwLock<Option<Arc<dyn ProcessingFinishedCallback>>>,
}

impl ActionSettings {
    /// Active action with the given desired thread count.
    pub fn new(num_threads: usize) -> Self {
        Self {
            active: true,
            num_threads,
            callback: RwLock::new(None),
        }
    }

    /// Sets the activation flag. Inactive actions are skipped when wiring the pipeline.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether the action takes part in runs.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Configured thread count.
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Installs (or clears) the "processing finished" callback.
    pub fn set_finished_callback(&self, callback: Option<Arc<dyn ProcessingFinishedCallback>>) {
        *self.callback.write() = callback;
    }

    /// Currently installed callback.
    pub fn finished_callback(&self) -> Option<Arc<dyn ProcessingFinishedCallback>> {
        self.callback.read().clone()
    }
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self::new(1)
    }
}

impl std::fmt::Debug for ActionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSettings")
            .field("active", &self.active)
            .field("num_threads", &self.num_threads)
            .field("has_callback", &self.callback.read().is_some())
            .finish()
    }
}

/// A processing stage of a task.
///
/// `process` may be called concurrently from several workers when the action's
/// group has more than one thread; actions that keep cross-item state should
/// return `true` from [`Action::enforce_single_thread`].
#[async_trait]
pub trait Action: Lifecycle {
    /// Stable id (for logs and dry-run results).
    fn id(&self) -> &str;

    /// Shared configuration.
    fn settings(&self) -> &ActionSettings;

    /// Whether the action must never run on more than one worker.
    fn enforce_single_thread(&self) -> bool {
        false
    }

    /// Thread count used for partitioning: 1 if single-threading is enforced.
    fn effective_threads(&self) -> usize {
        if self.enforce_single_thread() {
            1
        } else {
            self.settings().num_threads()
        }
    }

    /// Transforms one item into zero or more items.
    ///
    /// An empty result stops the chain for that item.
    async fn process(
        &self,
        item: &DataItem,
        execution: &JobExecution,
    ) -> Result<Vec<DataItem>, ComponentError>;

    /// Flushes buffered items once all input was processed.
    async fn complete(&self) -> Result<Vec<DataItem>, ComponentError> {
        Ok(Vec::new())
    }
}

/// Shared action handle.
pub type ActionRef = Arc<dyn Action>;
