//! # Executor configuration.
//!
//! [`ExecutorConfig`] sizes the executor's job slots, drives its tick and bounds
//! its shutdown.

use std::time::Duration;

/// Settings of the [`JobExecutor`](crate::JobExecutor).
///
/// ## Field semantics
/// - `job_queue_size`: max concurrently running ordinary jobs (the slot count)
/// - `tick`: update interval of the spawned executor actor (min 1ms)
/// - `grace`: max wait for running jobs to wind down on shutdown (`0s` = no wait)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `command_capacity`: queue size of [`ExecutorHandle`](crate::ExecutorHandle) commands (min 1)
/// - `handle_os_signals`: whether the actor also stops on SIGINT/SIGTERM/SIGQUIT
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Global slot count shared by ordinary jobs.
    ///
    /// Event-triggered jobs start regardless of free slots but still occupy one
    /// while active.
    pub job_queue_size: usize,

    /// Interval between two `update()` cycles of the actor.
    pub tick: Duration,

    /// Maximum time to wait for running jobs after shutdown was requested.
    ///
    /// When exceeded, shutdown returns `ExecutorError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Capacity of the actor's command queue.
    pub command_capacity: usize,

    /// Stop the actor on OS termination signals.
    pub handle_os_signals: bool,
}

impl ExecutorConfig {
    /// Tick clamped to a minimum of 1ms (`tokio::time::interval` rejects zero).
    #[inline]
    pub fn tick_clamped(&self) -> Duration {
        self.tick.max(Duration::from_millis(1))
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `job_queue_size = 5`
    /// - `tick = 1s`
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 256`
    /// - `handle_os_signals = false`
    fn default() -> Self {
        Self {
            job_queue_size: 5,
            tick: Duration::from_secs(1),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            command_capacity: 256,
            handle_os_signals: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_helpers() {
        let cfg = ExecutorConfig {
            tick: Duration::ZERO,
            bus_capacity: 0,
            command_capacity: 0,
            ..ExecutorConfig::default()
        };
        assert_eq!(cfg.tick_clamped(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.command_capacity_clamped(), 1);
    }
}
