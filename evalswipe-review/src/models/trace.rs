//! Trace model: one recorded agent execution under review

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::timestamp;

/// Reviewer judgment on a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Defer,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Defer => "defer",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status derived from a trace's review fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceStatus {
    Unreviewed,
    Reviewed(Verdict),
}

impl TraceStatus {
    /// Human-readable label ("Pass", "Not Reviewed", ...)
    pub fn label(&self) -> &'static str {
        match self {
            TraceStatus::Unreviewed => "Not Reviewed",
            TraceStatus::Reviewed(Verdict::Pass) => "Pass",
            TraceStatus::Reviewed(Verdict::Fail) => "Fail",
            TraceStatus::Reviewed(Verdict::Defer) => "Defer",
        }
    }
}

/// A single step inside a trace (tool call, retrieval, LLM call...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Complete trace of an LLM interaction plus its review fields
///
/// `reviewed` is true exactly when `pass_fail` is set. The review fields are
/// written only by the annotation workflow or by undo restoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub user_input: String,
    pub agent_output: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub intermediate_steps: Vec<TraceStep>,
    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub pass_fail: Option<Verdict>,
    #[serde(default)]
    pub open_code: Option<String>,
    #[serde(default)]
    pub axial_tags: Vec<String>,
    #[serde(default)]
    pub reviewer_id: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Trace {
    /// Unreviewed trace with only the required content fields
    pub fn new(
        id: impl Into<String>,
        user_input: impl Into<String>,
        agent_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_input: user_input.into(),
            agent_output: agent_output.into(),
            system_prompt: None,
            intermediate_steps: Vec::new(),
            metadata: Map::new(),
            reviewed: false,
            pass_fail: None,
            open_code: None,
            axial_tags: Vec::new(),
            reviewer_id: None,
            reviewed_at: None,
        }
    }

    pub fn status(&self) -> TraceStatus {
        match (self.reviewed, self.pass_fail) {
            (true, Some(verdict)) => TraceStatus::Reviewed(verdict),
            _ => TraceStatus::Unreviewed,
        }
    }

    /// `reviewed` and `pass_fail` agree
    pub fn is_consistent(&self) -> bool {
        self.reviewed == self.pass_fail.is_some()
    }

    /// Make `reviewed` follow `pass_fail`; returns true if anything changed
    pub fn normalize_review_fields(&mut self) -> bool {
        if self.is_consistent() {
            return false;
        }
        self.reviewed = self.pass_fail.is_some();
        true
    }

    /// Apply a confirmed decision to the review fields
    pub(crate) fn apply_decision(
        &mut self,
        verdict: Verdict,
        open_code: Option<String>,
        axial_tags: Vec<String>,
        reviewer_id: &str,
        at: DateTime<Utc>,
    ) {
        self.reviewed = true;
        self.pass_fail = Some(verdict);
        self.open_code = open_code;
        self.axial_tags = axial_tags;
        self.reviewer_id = Some(reviewer_id.to_string());
        self.reviewed_at = Some(at);
    }
}
