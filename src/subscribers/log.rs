//! # LogWriter: writes executor events through `tracing`.
//!
//! ```text
//! INFO  job state changed job_id="etl" execution=7 state=RUNNING
//! DEBUG job state refreshed job_id="etl" execution=8 state=WAITING
//! WARN  grace period exceeded reason="stuck: [\"etl\"]"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{JobEvent, JobEventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &JobEvent) {
        let job_id = e.job_id().unwrap_or("-");
        let execution = e.execution.as_ref().map(|r| r.id);
        let state = e.execution.as_ref().map(|r| r.state.as_str());
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            JobEventKind::StateChange => {
                info!(seq = e.seq, job_id, ?execution, ?state, "job state changed");
            }
            JobEventKind::StateRefresh => {
                debug!(seq = e.seq, job_id, ?execution, ?state, "job state refreshed");
            }
            JobEventKind::ShutdownRequested => info!("shutdown requested"),
            JobEventKind::AllStoppedWithin => info!("all jobs stopped within grace"),
            JobEventKind::GraceExceeded => warn!(reason, "grace period exceeded"),
            JobEventKind::SubscriberOverflow => warn!(reason, "subscriber overflow"),
            JobEventKind::SubscriberPanicked => warn!(reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
