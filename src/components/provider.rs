use std::sync::Arc;

use async_trait::async_trait;

use crate::data::Map;
use crate::error::ComponentError;

use super::Lifecycle;

/// Source of task input data.
///
/// When a task has a provider, one initial item is dispatched per provided
/// datum instead of the single trigger item.
#[async_trait]
pub trait Provider: Lifecycle {
    /// Stable id (for logs).
    fn id(&self) -> &str;

    /// Returns the next datum, or `None` once exhausted.
    async fn next(&self) -> Result<Option<Map>, ComponentError>;
}

/// Shared provider handle.
pub type ProviderRef = Arc<dyn Provider>;
