//! Review progress, always recomputed from the traces

use serde::{Deserialize, Serialize};

use crate::models::{Trace, TraceStatus, Verdict};
use crate::session::ReviewSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub reviewed: usize,
    pub passed: usize,
    pub failed: usize,
    pub deferred: usize,
    /// Rounded to the nearest whole percent; 0 for an empty session
    pub percentage: u32,
}

impl Progress {
    pub fn from_traces<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Self {
        let mut progress = Progress::default();
        for trace in traces {
            progress.total += 1;
            if let TraceStatus::Reviewed(verdict) = trace.status() {
                progress.reviewed += 1;
                match verdict {
                    Verdict::Pass => progress.passed += 1,
                    Verdict::Fail => progress.failed += 1,
                    Verdict::Defer => progress.deferred += 1,
                }
            }
        }
        progress.percentage = percentage(progress.reviewed, progress.total);
        progress
    }

    pub fn unreviewed(&self) -> usize {
        self.total - self.reviewed
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.reviewed == self.total
    }
}

fn percentage(reviewed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (reviewed as f64 / total as f64 * 100.0).round() as u32
}

impl ReviewSession {
    pub fn progress(&self) -> Progress {
        Progress::from_traces(self.traces.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(verdict: Option<Verdict>) -> Trace {
        let mut trace = Trace::new("t", "in", "out");
        trace.reviewed = verdict.is_some();
        trace.pass_fail = verdict;
        trace
    }

    #[test]
    fn test_empty_is_zero_percent() {
        let progress = Progress::from_traces(std::iter::empty());
        assert_eq!(progress.percentage, 0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_three_of_four_is_75() {
        let traces = vec![
            trace(Some(Verdict::Pass)),
            trace(Some(Verdict::Fail)),
            trace(Some(Verdict::Defer)),
            trace(None),
        ];
        let progress = Progress::from_traces(&traces);
        assert_eq!(progress.reviewed, 3);
        assert_eq!(progress.percentage, 75);
        assert_eq!(
            (progress.passed, progress.failed, progress.deferred),
            (1, 1, 1)
        );
        assert_eq!(progress.unreviewed(), 1);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
    }
}
