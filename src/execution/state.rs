/// Lifecycle state of a [`JobExecution`](super::JobExecution).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobExecutionState {
    /// Queued; not picked up by the executor yet.
    Waiting = 0,
    /// Running an ordinary (one-shot or scheduled) job.
    Running = 1,
    /// Event-triggered job listening for events.
    Active = 2,
    /// Completed without error.
    Finished = 3,
    /// Aborted by an error.
    Failed = 4,
    /// Cancelled by the user.
    Cancelled = 5,
    /// Former failure superseded by a later run of a fault-tolerant job.
    Resolved = 6,
}

impl JobExecutionState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Waiting,
            1 => Self::Running,
            2 => Self::Active,
            3 => Self::Finished,
            4 => Self::Failed,
            5 => Self::Cancelled,
            _ => Self::Resolved,
        }
    }

    /// True for `Running` and `Active`: pipeline components keep working only while live.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Active)
    }

    /// True once the execution can no longer change by itself.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Cancelled | Self::Resolved
        )
    }

    /// Returns a short stable label (upper case, as stored by repositories).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for JobExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
