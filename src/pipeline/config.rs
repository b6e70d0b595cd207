//! # Pipeline configuration.
//!
//! [`PipelineConfig`] holds the timing and sizing knobs of one job's pipelines.
//! Every wait in the pipeline is bounded by one of these values so that
//! cancellation is observed promptly.

use std::time::Duration;

/// Per-job pipeline settings.
///
/// ## Field semantics
/// - `poll_timeout`: how long a worker (or the event loop) waits for input before re-checking state
/// - `offer_timeout`: how long a producer waits for queue space before re-checking state
/// - `termination_wait`: bounded wait used by `ConcurrencyGroup::await_termination`
/// - `idle_check_interval`: re-check interval while waiting for an idle input queue
/// - `queue_capacity`: bound of every inter-group queue (min 1)
/// - `simulation_limit`: max items per stage in dry runs (`0` = unlimited)
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Input poll timeout of workers and of the event loop.
    pub poll_timeout: Duration,
    /// Offer timeout when pushing into a full queue.
    pub offer_timeout: Duration,
    /// Upper bound of a single termination wait.
    pub termination_wait: Duration,
    /// Re-check interval while waiting for an idle input queue.
    pub idle_check_interval: Duration,
    /// Capacity of inter-group queues.
    pub queue_capacity: usize,
    /// Max items per stage in dry runs.
    pub simulation_limit: usize,
}

impl PipelineConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Dry-run limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` items per stage
    #[inline]
    pub fn simulation_limit(&self) -> Option<usize> {
        if self.simulation_limit == 0 {
            None
        } else {
            Some(self.simulation_limit)
        }
    }
}

impl Default for PipelineConfig {
    /// Default configuration:
    ///
    /// - `poll_timeout = 500ms`
    /// - `offer_timeout = 100ms`
    /// - `termination_wait = 1s`
    /// - `idle_check_interval = 100ms`
    /// - `queue_capacity = 1024`
    /// - `simulation_limit = 25`
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(500),
            offer_timeout: Duration::from_millis(100),
            termination_wait: Duration::from_secs(1),
            idle_check_interval: Duration::from_millis(100),
            queue_capacity: 1024,
            simulation_limit: 25,
        }
    }
}
