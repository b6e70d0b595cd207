//! # Job starters: wire the concurrency groups and feed the first queue.
//!
//! ```text
//!                  initial queue        output(0)=input(1)       output(n) = sink
//! trigger/provider ─────► [ group 0 ] ─────► [ group 1 ] ─ … ─► [ group n ] ─────►
//! ```
//!
//! - [`DefaultJobStarter`] dispatches one item (or one per provided datum) and returns.
//! - [`EventTriggeredJobStarter`] dispatches one item per trigger event for as long
//!   as the execution stays `ACTIVE`.

mod default;
mod event;

pub use default::DefaultJobStarter;
pub use event::EventTriggeredJobStarter;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::components::{ActionRef, ConnectorRef, ProviderRef, RunContext, TriggerRef};
use crate::error::PipelineError;

use super::group::ConcurrencyGroup;

/// Builds and feeds the pipeline of one task run.
#[async_trait]
pub trait JobStarter: Send + Sync {
    /// Initializes the components, wires the groups and dispatches the input.
    ///
    /// Returns the groups so the caller can drain and terminate them.
    async fn process(&self) -> Result<Vec<ConcurrencyGroup>, PipelineError>;

    /// Shuts the components down. Errors are logged, not returned.
    async fn shutdown(&self);
}

/// The components taking part in one run, with their connectors deduplicated.
pub(crate) struct Components {
    trigger: Option<TriggerRef>,
    provider: Option<ProviderRef>,
    actions: Vec<ActionRef>,
    connectors: Vec<ConnectorRef>,
}

impl Components {
    pub(crate) fn new(
        trigger: Option<TriggerRef>,
        provider: Option<ProviderRef>,
        actions: &[ActionRef],
    ) -> Self {
        let actions: Vec<ActionRef> = actions
            .iter()
            .filter(|a| a.settings().is_active())
            .cloned()
            .collect();

        let mut connectors: Vec<ConnectorRef> = Vec::new();
        let declared = trigger
            .iter()
            .flat_map(|t| t.connectors())
            .chain(provider.iter().flat_map(|p| p.connectors()))
            .chain(actions.iter().flat_map(|a| a.connectors()));
        for connector in declared {
            let seen = connectors
                .iter()
                .any(|c| std::ptr::addr_eq(Arc::as_ptr(c), Arc::as_ptr(&connector)));
            if !seen {
                connectors.push(connector);
            }
        }

        Self {
            trigger,
            provider,
            actions,
            connectors,
        }
    }

    /// Connectors first, then trigger, provider and actions.
    pub(crate) async fn initialize(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        for connector in &self.connectors {
            connector
                .initialize(ctx)
                .await
                .map_err(|e| PipelineError::component(connector.id(), e))?;
        }
        if let Some(trigger) = &self.trigger {
            trigger
                .initialize(ctx)
                .await
                .map_err(|e| PipelineError::component(trigger.id(), e))?;
        }
        if let Some(provider) = &self.provider {
            provider
                .initialize(ctx)
                .await
                .map_err(|e| PipelineError::component(provider.id(), e))?;
        }
        for action in &self.actions {
            action
                .initialize(ctx)
                .await
                .map_err(|e| PipelineError::component(action.id(), e))?;
        }
        Ok(())
    }

    /// Reverse order of [`Components::initialize`]; every component is shut down even if one fails.
    pub(crate) async fn shutdown(&self, ctx: &RunContext) {
        for action in self.actions.iter().rev() {
            if let Err(e) = action.shutdown(ctx).await {
                warn!(component = action.id(), error = %e, "shutdown failed");
            }
        }
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.shutdown(ctx).await {
                warn!(component = provider.id(), error = %e, "shutdown failed");
            }
        }
        if let Some(trigger) = &self.trigger {
            if let Err(e) = trigger.shutdown(ctx).await {
                warn!(component = trigger.id(), error = %e, "shutdown failed");
            }
        }
        for connector in self.connectors.iter().rev() {
            if let Err(e) = connector.shutdown(ctx).await {
                warn!(component = connector.id(), error = %e, "shutdown failed");
            }
        }
    }
}
