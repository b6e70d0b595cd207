//! Error types used by the jobvisor runtime and its components.
//!
//! This module defines the error enums shared across the crate:
//!
//! - [`ComponentError`]: errors raised by user components (actions, triggers, providers, connectors).
//! - [`PipelineError`]: errors raised while wiring or running a task pipeline.
//! - [`EventError`]: errors raised when queuing trigger events.
//! - [`RepositoryError`]: errors raised by persistence collaborators.
//! - [`ExecutorError`]: errors raised by the job executor and its handle.
//!
//! All types provide `as_label` (stable snake_case for logs) and `as_message` helpers.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by user components.
///
/// Returned from [`Action::process`](crate::Action::process),
/// [`Lifecycle::initialize`](crate::Lifecycle::initialize) and friends.
/// Arbitrary errors can be lifted with `?` through the [`ComponentError::Other`] variant.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ComponentError {
    /// Component failed while processing.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Component is misconfigured (missing or malformed parameter).
    #[error("invalid configuration: {error}")]
    Configuration {
        /// The underlying error message.
        error: String,
    },

    /// Any other error raised by component code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComponentError {
    /// Shorthand for [`ComponentError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ComponentError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`ComponentError::Configuration`].
    pub fn configuration(error: impl Into<String>) -> Self {
        ComponentError::Configuration {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::ComponentError;
    ///
    /// let err = ComponentError::fail("boom");
    /// assert_eq!(err.as_label(), "component_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ComponentError::Fail { .. } => "component_failed",
            ComponentError::Configuration { .. } => "component_configuration",
            ComponentError::Other(_) => "component_other",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ComponentError::Fail { error } => format!("error: {error}"),
            ComponentError::Configuration { error } => format!("configuration: {error}"),
            ComponentError::Other(e) => format!("error: {e:#}"),
        }
    }
}

/// # Errors produced while wiring or running a task pipeline.
///
/// Configuration errors surface before any worker is spawned.
/// Component and worker errors are recorded as the failure cause of the job execution.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The action graph is invalid (e.g. a zero thread count).
    #[error("invalid pipeline configuration: {reason}")]
    Configuration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A component failed during one of its lifecycle calls.
    #[error("component '{component}' failed: {source}")]
    Component {
        /// Id of the failing component.
        component: String,
        /// The component's error.
        #[source]
        source: ComponentError,
    },

    /// A worker panicked while running the action chain.
    #[error("worker '{worker}' panicked: {info}")]
    WorkerPanicked {
        /// Worker name (`<group>-<index>`).
        worker: String,
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl PipelineError {
    /// Shorthand for [`PipelineError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        PipelineError::Configuration {
            reason: reason.into(),
        }
    }

    /// Wraps a component error with the id of the component that raised it.
    pub fn component(component: impl Into<String>, source: ComponentError) -> Self {
        PipelineError::Component {
            component: component.into(),
            source,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineError::Configuration { .. } => "pipeline_configuration",
            PipelineError::Component { .. } => "pipeline_component_failed",
            PipelineError::WorkerPanicked { .. } => "pipeline_worker_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PipelineError::Configuration { reason } => format!("configuration: {reason}"),
            PipelineError::Component { component, source } => {
                format!("component={component} {}", source.as_message())
            }
            PipelineError::WorkerPanicked { worker, info } => {
                format!("worker={worker} panic={info}")
            }
        }
    }
}

/// # Errors produced when handing an event to an event trigger.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// No event-triggered job starter is currently listening.
    #[error("event trigger is not listening")]
    NotListening,

    /// The event queue is at capacity; the event was rejected.
    #[error("event queue is full")]
    QueueFull,
}

impl EventError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::NotListening => "event_not_listening",
            EventError::QueueFull => "event_queue_full",
        }
    }
}

/// # Errors produced by persistence collaborators.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The backing store could not be reached.
    #[error("repository unavailable: {error}")]
    Unavailable {
        /// The underlying error message.
        error: String,
    },

    /// Any other storage error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RepositoryError::Unavailable { .. } => "repository_unavailable",
            RepositoryError::Other(_) => "repository_other",
        }
    }
}

/// # Errors produced by the job executor.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// A job id was required but blank.
    #[error("job id is required")]
    MissingJobId,

    /// The executor actor is gone.
    #[error("executor is closed")]
    Closed,

    /// The executor command queue is full.
    #[error("executor command queue is full")]
    Full,

    /// Shutdown grace period was exceeded; some jobs were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of jobs that did not wind down in time.
        stuck: Vec<String>,
    },
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::ExecutorError;
    /// use std::time::Duration;
    ///
    /// let err = ExecutorError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "executor_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::MissingJobId => "executor_missing_job_id",
            ExecutorError::Closed => "executor_closed",
            ExecutorError::Full => "executor_full",
            ExecutorError::GraceExceeded { .. } => "executor_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ExecutorError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck jobs={stuck:?}")
            }
            other => other.to_string(),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
