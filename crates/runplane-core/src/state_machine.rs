//! The run state machine (C, spec §4.2).
//!
//! Pure transition validation over [`RunState`] — no I/O, no audit. Callers
//! (chiefly [`crate::run_context::RunContext`]) use [`validate`] before
//! mutating a run and persisting the new state.

use crate::domain::{RunState, RunplaneError};

/// Lookup table of legal forward transitions (spec §4.2).
fn allowed(from: RunState) -> &'static [RunState] {
    use RunState::*;
    match from {
        Queued => &[Triaged, Failed, Aborted],
        Triaged => &[Planned, Failed, Aborted],
        Planned => &[Resolving, Failed, Aborted],
        Resolving => &[Review, Failed, Aborted],
        Review => &[AwaitingApproval, Resolving, Failed, Aborted],
        AwaitingApproval => &[Applying, Aborted, Failed],
        Applying => &[Done, Failed, Aborted],
        Done | Aborted | Failed => &[],
    }
}

/// Whether `from -> to` is a legal edge.
pub fn is_valid(from: RunState, to: RunState) -> bool {
    allowed(from).contains(&to)
}

/// Validate `from -> to`, returning an `InvalidTransition` error naming the
/// attempted edge when illegal (spec §4.2).
pub fn validate(run_id: &str, from: RunState, to: RunState) -> Result<(), RunplaneError> {
    if is_valid(from, to) {
        Ok(())
    } else {
        Err(RunplaneError::InvalidTransition {
            run_id: run_id.to_string(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Length of the longest path from `queued` to each state along the "happy
/// path" (i.e. ignoring the `resolving <- review` backedge and the
/// terminal failure/abort edges). Used by [`progress`] to compute a 0..100
/// completion percentage.
fn happy_path_index(state: RunState) -> Option<u32> {
    use RunState::*;
    match state {
        Queued => Some(0),
        Triaged => Some(1),
        Planned => Some(2),
        Resolving => Some(3),
        Review => Some(4),
        AwaitingApproval => Some(5),
        Applying => Some(6),
        Done => None, // terminal: handled separately, always 100
        Aborted | Failed => None,
    }
}

const HAPPY_PATH_LEN: u32 = 7; // queued..=applying, then done

/// Progress in `0..=100` for a run currently in `state` (spec §4.2).
/// Terminal states (including `done`) are always 100.
pub fn progress(state: RunState) -> u8 {
    if state.is_terminal() {
        return 100;
    }
    match happy_path_index(state) {
        Some(idx) => ((idx * 100) / HAPPY_PATH_LEN) as u8,
        None => 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RunState::*;

    #[test]
    fn queued_can_reach_triaged_failed_aborted_only() {
        assert!(is_valid(Queued, Triaged));
        assert!(is_valid(Queued, Failed));
        assert!(is_valid(Queued, Aborted));
        assert!(!is_valid(Queued, Done));
        assert!(!is_valid(Queued, Planned));
    }

    #[test]
    fn review_can_loop_back_to_resolving() {
        assert!(is_valid(Review, Resolving));
        assert!(is_valid(Review, AwaitingApproval));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for t in [Done, Aborted, Failed] {
            for to in [Queued, Triaged, Planned, Resolving, Review, AwaitingApproval, Applying, Done, Aborted, Failed] {
                assert!(!is_valid(t, to), "{t:?} -> {to:?} should be illegal");
            }
        }
    }

    #[test]
    fn validate_reports_attempted_edge() {
        let err = validate("run-1", Queued, Done).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("queued"));
        assert!(msg.contains("done"));
        assert!(msg.contains("run-1"));
    }

    #[test]
    fn progress_strictly_increases_along_happy_path() {
        let path = [Queued, Triaged, Planned, Resolving, Review, AwaitingApproval, Applying];
        let mut last = -1i32;
        for s in path {
            let p = progress(s) as i32;
            assert!(p > last, "progress did not increase at {s:?}");
            last = p;
        }
        assert_eq!(progress(Done), 100);
    }

    #[test]
    fn terminal_progress_is_always_100() {
        assert_eq!(progress(Done), 100);
        assert_eq!(progress(Aborted), 100);
        assert_eq!(progress(Failed), 100);
    }
}
