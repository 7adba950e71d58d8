//! Navigation over the session's traces
//!
//! Moving to a different trace abandons any unfinished fail draft.

use tracing::debug;

use crate::error::{ReviewError, ReviewResult};
use crate::models::Trace;
use crate::session::ReviewSession;

/// Where `advance_after_decision` ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(usize),
    /// No unreviewed trace ahead; the index now sits one past the last trace
    Complete,
}

impl ReviewSession {
    /// Trace at the current index; `None` in the end-of-list state
    pub fn current_trace(&self) -> Option<&Trace> {
        self.traces.get(self.current_index).ok()
    }

    pub fn go_to(&mut self, index: usize) -> ReviewResult<&Trace> {
        if index >= self.traces.len() {
            return Err(ReviewError::NotFound(format!(
                "Trace index {} out of range (0..{})",
                index,
                self.traces.len()
            )));
        }
        self.move_to(index);
        self.traces.get(index)
    }

    /// Step forward; a no-op on the last trace and in the end-of-list state
    pub fn go_next(&mut self) -> usize {
        if self.current_index + 1 >= self.traces.len() {
            return self.current_index;
        }
        self.move_to(self.current_index + 1);
        self.current_index
    }

    /// Step back; stays on the first trace instead of failing
    pub fn go_previous(&mut self) -> usize {
        if self.traces.is_empty() {
            return self.current_index;
        }
        let last = self.traces.len() - 1;
        self.move_to(self.current_index.saturating_sub(1).min(last));
        self.current_index
    }

    /// Move to the next unreviewed trace after the current one, never wrapping
    pub fn advance_after_decision(&mut self) -> Advance {
        match self.traces.find_next_unreviewed(self.current_index) {
            Some(index) => {
                self.move_to(index);
                Advance::Moved(index)
            }
            None => {
                self.move_to(self.traces.len());
                debug!(total = self.traces.len(), "No unreviewed traces ahead");
                Advance::Complete
            }
        }
    }

    fn move_to(&mut self, index: usize) {
        if index == self.current_index {
            return;
        }
        if self.fail_draft.take().is_some() {
            debug!(from = self.current_index, to = index, "Fail draft discarded by navigation");
        }
        self.current_index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionInfo, Verdict};

    fn session(flags: &[bool]) -> ReviewSession {
        let traces = flags
            .iter()
            .enumerate()
            .map(|(i, reviewed)| {
                let mut trace = Trace::new(format!("t{}", i), "in", "out");
                if *reviewed {
                    trace.reviewed = true;
                    trace.pass_fail = Some(Verdict::Pass);
                }
                trace
            })
            .collect();
        let info = SessionInfo {
            id: "session_nav".to_string(),
            name: "Nav".to_string(),
            created_at: None,
            mode: Default::default(),
            source: Default::default(),
            randomize_order: false,
        };
        ReviewSession::new(info, traces, Vec::new())
    }

    #[test]
    fn test_go_to_out_of_range() {
        let mut session = session(&[false, false]);
        assert!(matches!(session.go_to(2), Err(ReviewError::NotFound(_))));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.go_to(1).unwrap().id, "t1");
    }

    #[test]
    fn test_next_and_previous_clamp() {
        let mut session = session(&[false, false]);
        assert_eq!(session.go_previous(), 0);
        assert_eq!(session.go_next(), 1);
        assert_eq!(session.go_next(), 1);
    }

    #[test]
    fn test_previous_from_end_state_lands_on_last() {
        let mut session = session(&[true, true]);
        assert_eq!(session.advance_after_decision(), Advance::Complete);
        assert_eq!(session.current_index(), 2);
        assert!(session.current_trace().is_none());

        assert_eq!(session.go_previous(), 1);
    }

    #[test]
    fn test_next_from_end_state_stays_put() {
        let mut session = session(&[true, true]);
        assert_eq!(session.advance_after_decision(), Advance::Complete);

        assert_eq!(session.go_next(), 2);
        assert!(session.current_trace().is_none());
    }

    #[test]
    fn test_advance_skips_reviewed_and_does_not_wrap() {
        let mut session = session(&[false, true, false]);
        assert_eq!(session.advance_after_decision(), Advance::Moved(2));
        // t0 is still unreviewed but lies behind the current trace
        assert_eq!(session.advance_after_decision(), Advance::Complete);
        assert_eq!(session.current_index(), 3);
    }

    #[test]
    fn test_navigation_discards_fail_draft() {
        let mut session = session(&[false, false]);
        session.begin_fail_flow().unwrap();
        session.go_to(0).unwrap();
        assert!(session.fail_draft().is_some());

        session.go_next();
        assert!(session.fail_draft().is_none());
    }

    #[test]
    fn test_empty_session_navigation_is_noop() {
        let mut session = session(&[]);
        assert_eq!(session.go_next(), 0);
        assert_eq!(session.go_previous(), 0);
        assert_eq!(session.advance_after_decision(), Advance::Complete);
        assert!(session.current_trace().is_none());
    }
}
