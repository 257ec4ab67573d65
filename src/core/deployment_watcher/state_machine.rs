// src/core/deployment_watcher/state_machine.rs
//
// The per-deployment state table (spec.md §4.6). `DeploymentStatusKind`
// itself lives in `core::domain::deployment`; this module only validates
// the transitions between its values, kept separate from the domain type
// so the transition table reads as a table rather than scattered match arms.

use crate::core::domain::DeploymentStatusKind as S;

/// Whether moving from `from` to `to` is a transition this watcher (or an
/// operator RPC) is allowed to make.
pub fn transition_allowed(from: S, to: S) -> bool {
    use S::*;
    match (from, to) {
        (Running, Paused | Successful | Failed) => true,
        (RunningNeedsPromotion, Running | Failed) => true,
        (Paused, Running | Failed) => true,
        (Successful | Failed | Cancelled, _) => false,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        assert!(!transition_allowed(S::Successful, S::Running));
        assert!(!transition_allowed(S::Failed, S::Paused));
        assert!(!transition_allowed(S::Cancelled, S::Running));
    }

    #[test]
    fn promotion_moves_needs_promotion_to_running() {
        assert!(transition_allowed(S::RunningNeedsPromotion, S::Running));
    }

    #[test]
    fn pause_then_unpause_round_trips() {
        assert!(transition_allowed(S::Running, S::Paused));
        assert!(transition_allowed(S::Paused, S::Running));
    }
}
