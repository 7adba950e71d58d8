//! History listing over a session's traces

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ReviewError;
use crate::models::{TraceStatus, Verdict};
use crate::progress::Progress;
use crate::session::ReviewSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    Pass,
    Fail,
    Defer,
    Unreviewed,
}

impl HistoryFilter {
    fn matches(&self, status: TraceStatus) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Pass => status == TraceStatus::Reviewed(Verdict::Pass),
            HistoryFilter::Fail => status == TraceStatus::Reviewed(Verdict::Fail),
            HistoryFilter::Defer => status == TraceStatus::Reviewed(Verdict::Defer),
            HistoryFilter::Unreviewed => status == TraceStatus::Unreviewed,
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(HistoryFilter::All),
            "pass" => Ok(HistoryFilter::Pass),
            "fail" => Ok(HistoryFilter::Fail),
            "defer" => Ok(HistoryFilter::Defer),
            "unreviewed" => Ok(HistoryFilter::Unreviewed),
            other => Err(ReviewError::Validation(format!(
                "Unknown history filter '{}' (all, pass, fail, defer, unreviewed)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistorySort {
    /// Session order
    #[default]
    Original,
    /// Newest decision first; traces without a timestamp go last
    Recent,
    /// fail, defer, pass, then unreviewed
    Status,
}

impl FromStr for HistorySort {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(HistorySort::Original),
            "recent" => Ok(HistorySort::Recent),
            "status" => Ok(HistorySort::Status),
            other => Err(ReviewError::Validation(format!(
                "Unknown history sort '{}' (original, recent, status)",
                other
            ))),
        }
    }
}

fn status_rank(status: TraceStatus) -> u8 {
    match status {
        TraceStatus::Reviewed(Verdict::Fail) => 0,
        TraceStatus::Reviewed(Verdict::Defer) => 1,
        TraceStatus::Reviewed(Verdict::Pass) => 2,
        TraceStatus::Unreviewed => 3,
    }
}

fn by_recent(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// One row of the history view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Position in the session; pass to `go_to` to jump there
    pub index: usize,
    pub trace_id: String,
    pub status: String,
    pub user_input: String,
    pub open_code: Option<String>,
    pub tag_names: Vec<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// History counters: progress plus the unreviewed remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub reviewed: usize,
    pub passed: usize,
    pub failed: usize,
    pub deferred: usize,
    pub unreviewed: usize,
}

impl From<Progress> for HistoryStats {
    fn from(progress: Progress) -> Self {
        Self {
            total: progress.total,
            reviewed: progress.reviewed,
            passed: progress.passed,
            failed: progress.failed,
            deferred: progress.deferred,
            unreviewed: progress.unreviewed(),
        }
    }
}

impl ReviewSession {
    pub fn history(&self, filter: HistoryFilter, sort: HistorySort) -> Vec<HistoryEntry> {
        let mut rows: Vec<(TraceStatus, HistoryEntry)> = self
            .traces
            .iter()
            .enumerate()
            .filter(|(_, trace)| filter.matches(trace.status()))
            .map(|(index, trace)| {
                let status = trace.status();
                let entry = HistoryEntry {
                    index,
                    trace_id: trace.id.clone(),
                    status: status.label().to_string(),
                    user_input: trace.user_input.clone(),
                    open_code: trace.open_code.clone(),
                    tag_names: trace
                        .axial_tags
                        .iter()
                        .map(|id| self.tags.display_name(id).to_string())
                        .collect(),
                    reviewed_at: trace.reviewed_at,
                };
                (status, entry)
            })
            .collect();

        match sort {
            HistorySort::Original => {}
            HistorySort::Recent => rows.sort_by(|a, b| by_recent(a.1.reviewed_at, b.1.reviewed_at)),
            HistorySort::Status => rows.sort_by_key(|(status, _)| status_rank(*status)),
        }

        rows.into_iter().map(|(_, entry)| entry).collect()
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.progress().into()
    }
}
