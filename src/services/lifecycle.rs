//! Pure session lifecycle rules.
//!
//! The state machine is consulted before every session mutation. It never
//! touches storage: given `(current, requested)` it either allows the
//! transition or names the illegal pair.

use crate::models::session::UploadStatus;

/// An illegal `(current, requested)` transition pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub current: UploadStatus,
    pub requested: UploadStatus,
}

/// Whether a session in `current` may move to `requested`.
///
/// The self-loops (ACTIVE→ACTIVE for additional chunks, COMPLETED→COMPLETED
/// for repeated completion calls) are the idempotent no-op transitions.
pub fn transition_allowed(current: UploadStatus, requested: UploadStatus) -> bool {
    use UploadStatus::*;
    matches!(
        (current, requested),
        (Pending, Active)
            | (Pending, Aborted)
            | (Active, Active)
            | (Active, Completed)
            | (Active, Failed)
            | (Active, Aborted)
            | (Completed, Completed)
    )
}

/// Validate a transition, returning the offending pair on denial.
pub fn ensure_transition(
    current: UploadStatus,
    requested: UploadStatus,
) -> Result<(), IllegalTransition> {
    if transition_allowed(current, requested) {
        Ok(())
    } else {
        Err(IllegalTransition { current, requested })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::UploadStatus::*;

    const ALL: [UploadStatus; 5] = [Pending, Active, Completed, Failed, Aborted];

    #[test]
    fn allowed_transitions() {
        assert!(transition_allowed(Pending, Active));
        assert!(transition_allowed(Pending, Aborted));
        assert!(transition_allowed(Active, Active));
        assert!(transition_allowed(Active, Completed));
        assert!(transition_allowed(Active, Failed));
        assert!(transition_allowed(Active, Aborted));
        assert!(transition_allowed(Completed, Completed));
    }

    #[test]
    fn terminal_states_admit_no_new_work() {
        for terminal in [Completed, Failed, Aborted] {
            assert!(terminal.is_terminal());
            assert!(!transition_allowed(terminal, Active));
            assert!(!transition_allowed(terminal, Pending));
        }
        assert!(!Pending.is_terminal());
        assert!(!Active.is_terminal());
        // The one permitted terminal self-loop is the idempotent repeat.
        assert!(!transition_allowed(Failed, Failed));
        assert!(!transition_allowed(Aborted, Aborted));
    }

    #[test]
    fn pending_cannot_complete_or_fail() {
        assert!(!transition_allowed(Pending, Completed));
        assert!(!transition_allowed(Pending, Failed));
    }

    #[test]
    fn nothing_reenters_pending() {
        for from in ALL {
            assert!(!transition_allowed(from, Pending));
        }
    }

    #[test]
    fn denial_names_the_pair() {
        let err = ensure_transition(Aborted, Active).unwrap_err();
        assert_eq!(err.current, Aborted);
        assert_eq!(err.requested, Active);
    }

    #[test]
    fn exact_transition_count() {
        let allowed = ALL
            .iter()
            .flat_map(|&a| ALL.iter().map(move |&b| (a, b)))
            .filter(|&(a, b)| transition_allowed(a, b))
            .count();
        assert_eq!(allowed, 7);
    }
}
