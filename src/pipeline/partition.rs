//! # Action partitioning.
//!
//! Splits an ordered action list into contiguous runs of equal effective
//! thread count. Inactive actions are skipped; an action that enforces
//! single-threading counts as one thread.
//!
//! ```text
//! actions:   A(2)  B(2)  C(1, single)  D(4)  E(inactive)  F(4)
//! groups:    [A, B]:2    [C]:1         [D, F]:4
//! ```

use crate::components::ActionRef;
use crate::error::PipelineError;

/// A contiguous run of active actions sharing one thread count.
#[derive(Clone)]
pub struct ActionGroup {
    /// Worker count of the group.
    pub num_threads: usize,
    /// The actions, in declared order.
    pub actions: Vec<ActionRef>,
}

impl std::fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.actions.iter().map(|a| a.id()).collect();
        f.debug_struct("ActionGroup")
            .field("num_threads", &self.num_threads)
            .field("actions", &ids)
            .finish()
    }
}

/// Partitions `actions` into groups. Deterministic for a given input.
///
/// Fails if an active action declares zero threads.
pub fn partition(actions: &[ActionRef]) -> Result<Vec<ActionGroup>, PipelineError> {
    let mut groups: Vec<ActionGroup> = Vec::new();
    let mut previous: Option<usize> = None;

    for action in actions.iter().filter(|a| a.settings().is_active()) {
        let threads = action.effective_threads();
        if threads == 0 {
            return Err(PipelineError::configuration(format!(
                "action '{}' declares zero threads",
                action.id()
            )));
        }

        match groups.last_mut() {
            Some(group) if previous == Some(threads) => group.actions.push(action.clone()),
            _ => groups.push(ActionGroup {
                num_threads: threads,
                actions: vec![action.clone()],
            }),
        }
        previous = Some(threads);
    }

    Ok(groups)
}
