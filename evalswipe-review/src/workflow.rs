//! Annotation workflow
//!
//! Per-trace state machine:
//!
//! ```text
//! Unreviewed ──pass/defer──────────────────────────────▶ Reviewed(Pass|Defer)
//!     │
//!     └─fail─▶ AwaitingOpenCode ──later──────────────────▶ Reviewed(Fail), no tags
//!                     │
//!                     └─now (≥20 chars)─▶ AwaitingAxialTags ──apply─▶ Reviewed(Fail)
//! ```
//!
//! Every transition that ends in a reviewed state persists the annotation
//! through the backend first. Local state is only touched after the backend
//! confirms, so a failed call leaves the trace and the undo stack as they were.

use tracing::{debug, info};

use evalswipe_common::time;

use crate::backend::ReviewBackend;
use crate::error::{ReviewError, ReviewResult};
use crate::models::{Annotation, TraceStatus, Verdict};
use crate::session::ReviewSession;

/// Minimum open-code length for the tag-now path
pub const TAG_NOW_MIN_OPEN_CODE_CHARS: usize = 20;

/// Where a trace sits in the annotation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    Unreviewed,
    AwaitingOpenCode,
    AwaitingAxialTags,
    Reviewed(Verdict),
}

/// How a failure's open code is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPath {
    /// Continue to axial tagging; needs a substantive note
    Now,
    /// Record the failure immediately without tags
    Later,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStage {
    AwaitingOpenCode,
    AwaitingAxialTags,
}

/// Working copy of a failure annotation that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct FailDraft {
    pub trace_index: usize,
    pub stage: FailStage,
    pub open_code: String,
    pub axial_tags: Vec<String>,
}

/// A decision the backend accepted and the session applied
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub trace_index: usize,
    pub trace_id: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Open code accepted, the draft now collects tags
    AwaitingAxialTags,
    Recorded(Decision),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    Restored { trace_index: usize, trace_id: String },
    NothingToUndo,
}

impl ReviewSession {
    /// Workflow phase of the trace at `index`
    pub fn phase_of(&self, index: usize) -> ReviewResult<ReviewPhase> {
        let trace = self.traces.get(index)?;
        if let TraceStatus::Reviewed(verdict) = trace.status() {
            return Ok(ReviewPhase::Reviewed(verdict));
        }
        Ok(match &self.fail_draft {
            Some(draft) if draft.trace_index == index => match draft.stage {
                FailStage::AwaitingOpenCode => ReviewPhase::AwaitingOpenCode,
                FailStage::AwaitingAxialTags => ReviewPhase::AwaitingAxialTags,
            },
            _ => ReviewPhase::Unreviewed,
        })
    }

    pub async fn record_pass(
        &mut self,
        backend: &dyn ReviewBackend,
        reviewer_id: &str,
    ) -> ReviewResult<Decision> {
        self.record_simple(backend, reviewer_id, Verdict::Pass).await
    }

    pub async fn record_defer(
        &mut self,
        backend: &dyn ReviewBackend,
        reviewer_id: &str,
    ) -> ReviewResult<Decision> {
        self.record_simple(backend, reviewer_id, Verdict::Defer).await
    }

    async fn record_simple(
        &mut self,
        backend: &dyn ReviewBackend,
        reviewer_id: &str,
        verdict: Verdict,
    ) -> ReviewResult<Decision> {
        let index = self.decidable_index()?;
        let trace_id = self.traces.get(index)?.id.clone();

        backend
            .create_annotation(&Annotation::simple(&trace_id, verdict, reviewer_id))
            .await?;

        let decision = self.apply_confirmed(index, verdict, None, Vec::new(), reviewer_id)?;
        info!(trace_id = %decision.trace_id, verdict = %verdict, "Decision recorded");
        Ok(decision)
    }

    /// Start failing the current trace
    ///
    /// Local only. A fresh draft is seeded from whatever open code and tags
    /// the trace already carries; an unfinished draft for the same trace is
    /// kept as it is.
    pub fn begin_fail_flow(&mut self) -> ReviewResult<&FailDraft> {
        let index = self.decidable_index()?;

        let draft = match self.fail_draft.take() {
            Some(draft) if draft.trace_index == index => {
                debug!(trace_index = index, stage = ?draft.stage, "Fail flow resumed");
                draft
            }
            _ => {
                let trace = self.traces.get(index)?;
                debug!(trace_index = index, "Fail flow started");
                FailDraft {
                    trace_index: index,
                    stage: FailStage::AwaitingOpenCode,
                    open_code: trace.open_code.clone().unwrap_or_default(),
                    axial_tags: trace.axial_tags.clone(),
                }
            }
        };
        let draft: &FailDraft = self.fail_draft.insert(draft);
        Ok(draft)
    }

    /// Submit the open code for the trace being failed
    ///
    /// Both paths need a non-empty note. `TagPath::Now` also needs at least
    /// 20 characters and only moves the draft on; `TagPath::Later` persists
    /// the failure with no tags right away.
    pub async fn submit_open_code(
        &mut self,
        backend: &dyn ReviewBackend,
        reviewer_id: &str,
        text: &str,
        path: TagPath,
    ) -> ReviewResult<SubmitOutcome> {
        let index = self.draft_index(FailStage::AwaitingOpenCode)?;

        let open_code = text.trim();
        if open_code.is_empty() {
            return Err(ReviewError::Validation(
                "Please write an open code first".to_string(),
            ));
        }

        match path {
            TagPath::Now => {
                if open_code.chars().count() < TAG_NOW_MIN_OPEN_CODE_CHARS {
                    return Err(ReviewError::Validation(format!(
                        "Open code should be at least {} characters",
                        TAG_NOW_MIN_OPEN_CODE_CHARS
                    )));
                }
                if let Some(draft) = self.fail_draft.as_mut() {
                    draft.open_code = open_code.to_string();
                    draft.stage = FailStage::AwaitingAxialTags;
                }
                debug!(trace_index = index, "Open code accepted, awaiting axial tags");
                Ok(SubmitOutcome::AwaitingAxialTags)
            }
            TagPath::Later => {
                let trace_id = self.traces.get(index)?.id.clone();
                backend
                    .create_annotation(&Annotation::fail(
                        &trace_id,
                        open_code.to_string(),
                        Vec::new(),
                        reviewer_id,
                    ))
                    .await?;

                let decision = self.apply_confirmed(
                    index,
                    Verdict::Fail,
                    Some(open_code.to_string()),
                    Vec::new(),
                    reviewer_id,
                )?;
                info!(trace_id = %decision.trace_id, "Failure recorded without tags");
                Ok(SubmitOutcome::Recorded(decision))
            }
        }
    }

    /// Flip `tag_id` in the draft's tag set; returns whether it is now selected
    ///
    /// Tag ids are not checked against the registry here.
    pub fn toggle_axial_tag(&mut self, tag_id: &str) -> ReviewResult<bool> {
        self.draft_index(FailStage::AwaitingAxialTags)?;
        let draft = self.fail_draft.as_mut().ok_or(ReviewError::Validation(
            "No failure is being tagged".to_string(),
        ))?;

        match draft.axial_tags.iter().position(|id| id == tag_id) {
            Some(position) => {
                draft.axial_tags.remove(position);
                Ok(false)
            }
            None => {
                draft.axial_tags.push(tag_id.to_string());
                Ok(true)
            }
        }
    }

    /// Persist the failure with the draft's open code and tags
    pub async fn commit_fail_with_tags(
        &mut self,
        backend: &dyn ReviewBackend,
        reviewer_id: &str,
    ) -> ReviewResult<Decision> {
        let index = self.draft_index(FailStage::AwaitingAxialTags)?;
        let (open_code, axial_tags) = match &self.fail_draft {
            Some(draft) => (draft.open_code.clone(), draft.axial_tags.clone()),
            None => {
                return Err(ReviewError::Validation(
                    "No failure is being tagged".to_string(),
                ))
            }
        };
        let trace_id = self.traces.get(index)?.id.clone();

        backend
            .create_annotation(&Annotation::fail(
                &trace_id,
                open_code.clone(),
                axial_tags.clone(),
                reviewer_id,
            ))
            .await?;

        let tag_count = axial_tags.len();
        let decision =
            self.apply_confirmed(index, Verdict::Fail, Some(open_code), axial_tags, reviewer_id)?;
        info!(trace_id = %decision.trace_id, tags = tag_count, "Failure recorded with tags");
        Ok(decision)
    }

    /// Drop the fail draft; returns false if there was none
    pub fn cancel_fail_flow(&mut self) -> bool {
        self.fail_draft.take().is_some()
    }

    /// Restore the most recent pre-decision snapshot and move to it
    ///
    /// Local only; the backend keeps the annotation it already has.
    pub fn undo(&mut self) -> ReviewResult<UndoOutcome> {
        let Some(entry) = self.undo.pop() else {
            return Ok(UndoOutcome::NothingToUndo);
        };

        let trace_id = entry.trace.id.clone();
        self.traces.set(entry.trace_index, entry.trace)?;
        self.current_index = entry.trace_index;
        self.fail_draft = None;

        info!(trace_id = %trace_id, trace_index = entry.trace_index, "Decision undone");
        Ok(UndoOutcome::Restored {
            trace_index: entry.trace_index,
            trace_id,
        })
    }

    /// Current index, if the current trace can still take a decision
    fn decidable_index(&self) -> ReviewResult<usize> {
        let index = self.require_current_index()?;
        let trace = self.traces.get(index)?;
        if trace.reviewed {
            return Err(ReviewError::Validation(format!(
                "Trace {} is already reviewed; undo to change the decision",
                trace.id
            )));
        }
        Ok(index)
    }

    /// Trace index of the fail draft, which must be at `stage`
    fn draft_index(&self, stage: FailStage) -> ReviewResult<usize> {
        match &self.fail_draft {
            Some(draft) if draft.stage == stage => Ok(draft.trace_index),
            Some(_) if stage == FailStage::AwaitingOpenCode => Err(ReviewError::Validation(
                "Open code was already submitted for this trace".to_string(),
            )),
            Some(_) => Err(ReviewError::Validation(
                "Submit an open code before tagging".to_string(),
            )),
            None => Err(ReviewError::Validation(
                "Start failing a trace first".to_string(),
            )),
        }
    }

    /// Mutate after the backend confirmed: snapshot, apply, push undo
    fn apply_confirmed(
        &mut self,
        index: usize,
        verdict: Verdict,
        open_code: Option<String>,
        axial_tags: Vec<String>,
        reviewer_id: &str,
    ) -> ReviewResult<Decision> {
        let entry = self.traces.snapshot(index)?;
        let trace = self.traces.get_mut(index)?;
        trace.apply_decision(verdict, open_code, axial_tags, reviewer_id, time::now());
        let trace_id = trace.id.clone();

        self.undo.push(entry);
        self.fail_draft = None;

        Ok(Decision {
            trace_index: index,
            trace_id,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, InMemoryBackend};
    use crate::models::{SessionInfo, Trace};
    use crate::undo::UNDO_CAPACITY;

    const REVIEWER: &str = "current_user";
    const LONG_NOTE: &str = "Recommended a flavor the product line does not have";

    fn info() -> SessionInfo {
        SessionInfo {
            id: "session_test".to_string(),
            name: "Test".to_string(),
            created_at: None,
            mode: Default::default(),
            source: Default::default(),
            randomize_order: false,
        }
    }

    async fn setup(count: usize) -> (ReviewSession, InMemoryBackend) {
        let traces: Vec<Trace> = (0..count)
            .map(|i| Trace::new(format!("t{}", i), "in", "out"))
            .collect();
        let backend = InMemoryBackend::new();
        backend
            .create_session(&crate::backend::CreateSessionRequest {
                name: "Test".to_string(),
                traces: traces.clone(),
                config: Default::default(),
            })
            .await
            .unwrap();
        (ReviewSession::new(info(), traces, Vec::new()), backend)
    }

    #[tokio::test]
    async fn test_pass_sets_review_fields_and_pushes_undo() {
        let (mut session, backend) = setup(2).await;

        let decision = session.record_pass(&backend, REVIEWER).await.unwrap();

        assert_eq!(decision.verdict, Verdict::Pass);
        let trace = session.traces().get(0).unwrap();
        assert!(trace.reviewed);
        assert_eq!(trace.pass_fail, Some(Verdict::Pass));
        assert!(trace.reviewed_at.is_some());
        assert_eq!(session.undo_depth(), 1);
        assert_eq!(backend.annotations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_trace_untouched() {
        let (mut session, backend) = setup(1).await;
        backend
            .fail_next(BackendError::Network("connection refused".to_string()))
            .await;

        let err = session.record_pass(&backend, REVIEWER).await.unwrap_err();

        assert!(matches!(err, ReviewError::Backend(_)));
        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::Unreviewed);
        assert_eq!(session.undo_depth(), 0);
    }

    #[tokio::test]
    async fn test_reviewed_trace_rejects_new_decision() {
        let (mut session, backend) = setup(1).await;
        session.record_defer(&backend, REVIEWER).await.unwrap();

        let err = session.record_pass(&backend, REVIEWER).await.unwrap_err();
        assert!(matches!(err, ReviewError::Validation(_)));
        assert_eq!(
            session.traces().get(0).unwrap().pass_fail,
            Some(Verdict::Defer)
        );
    }

    #[tokio::test]
    async fn test_short_open_code_blocks_tag_now_only() {
        let (mut session, backend) = setup(1).await;
        session.begin_fail_flow().unwrap();

        let err = session
            .submit_open_code(&backend, REVIEWER, "short", TagPath::Now)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Validation(_)));
        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::AwaitingOpenCode);

        let outcome = session
            .submit_open_code(&backend, REVIEWER, "short", TagPath::Later)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Recorded(_)));
        let trace = session.traces().get(0).unwrap();
        assert_eq!(trace.pass_fail, Some(Verdict::Fail));
        assert!(trace.axial_tags.is_empty());
        assert_eq!(trace.open_code.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn test_blank_open_code_rejected_on_both_paths() {
        let (mut session, backend) = setup(1).await;
        session.begin_fail_flow().unwrap();

        for path in [TagPath::Now, TagPath::Later] {
            let err = session
                .submit_open_code(&backend, REVIEWER, "   ", path)
                .await
                .unwrap_err();
            assert!(matches!(err, ReviewError::Validation(_)));
        }
        assert!(backend.annotations().await.is_empty());
    }

    #[tokio::test]
    async fn test_tag_now_then_apply() {
        let (mut session, backend) = setup(1).await;
        session.begin_fail_flow().unwrap();
        let outcome = session
            .submit_open_code(&backend, REVIEWER, LONG_NOTE, TagPath::Now)
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::AwaitingAxialTags);
        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::AwaitingAxialTags);

        assert!(session.toggle_axial_tag("tag_a").unwrap());
        assert!(session.toggle_axial_tag("tag_b").unwrap());
        assert!(!session.toggle_axial_tag("tag_a").unwrap());

        session.commit_fail_with_tags(&backend, REVIEWER).await.unwrap();

        let trace = session.traces().get(0).unwrap();
        assert_eq!(trace.axial_tags, vec!["tag_b".to_string()]);
        assert_eq!(trace.open_code.as_deref(), Some(LONG_NOTE));
        assert!(session.fail_draft().is_none());

        let sent = backend.annotations().await;
        assert_eq!(sent[0].axial_tags, vec!["tag_b".to_string()]);
    }

    #[tokio::test]
    async fn test_toggle_requires_awaiting_axial_tags() {
        let (mut session, _backend) = setup(1).await;
        assert!(session.toggle_axial_tag("tag_a").is_err());

        session.begin_fail_flow().unwrap();
        assert!(session.toggle_axial_tag("tag_a").is_err());
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_draft() {
        let (mut session, backend) = setup(1).await;
        session.begin_fail_flow().unwrap();
        session
            .submit_open_code(&backend, REVIEWER, LONG_NOTE, TagPath::Now)
            .await
            .unwrap();
        session.toggle_axial_tag("tag_a").unwrap();

        backend
            .fail_next(BackendError::Api {
                status: 500,
                detail: "boom".to_string(),
            })
            .await;
        assert!(session.commit_fail_with_tags(&backend, REVIEWER).await.is_err());

        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::AwaitingAxialTags);
        assert_eq!(session.fail_draft().unwrap().axial_tags, vec!["tag_a"]);
        assert!(!session.traces().get(0).unwrap().reviewed);
    }

    #[tokio::test]
    async fn test_begin_again_keeps_accepted_note_and_tags() {
        let (mut session, backend) = setup(1).await;
        session.begin_fail_flow().unwrap();
        session
            .submit_open_code(&backend, REVIEWER, LONG_NOTE, TagPath::Now)
            .await
            .unwrap();
        session.toggle_axial_tag("tag_a").unwrap();

        let draft = session.begin_fail_flow().unwrap();

        assert_eq!(draft.stage, FailStage::AwaitingAxialTags);
        assert_eq!(draft.open_code, LONG_NOTE);
        assert_eq!(draft.axial_tags, vec!["tag_a"]);
        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::AwaitingAxialTags);
    }

    #[tokio::test]
    async fn test_cancel_fail_flow() {
        let (mut session, _backend) = setup(1).await;
        session.begin_fail_flow().unwrap();
        assert!(session.cancel_fail_flow());
        assert!(!session.cancel_fail_flow());
        assert_eq!(session.phase_of(0).unwrap(), ReviewPhase::Unreviewed);
    }

    #[tokio::test]
    async fn test_undo_restores_exact_prior_trace() {
        let (mut session, backend) = setup(2).await;
        let before = session.traces().get(0).unwrap().clone();
        session.record_pass(&backend, REVIEWER).await.unwrap();
        session.current_index = 1;

        let outcome = session.undo().unwrap();

        assert_eq!(
            outcome,
            UndoOutcome::Restored {
                trace_index: 0,
                trace_id: "t0".to_string()
            }
        );
        assert_eq!(session.traces().get(0).unwrap(), &before);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.undo_depth(), 0);
        assert_eq!(session.undo().unwrap(), UndoOutcome::NothingToUndo);
    }

    #[tokio::test]
    async fn test_undo_depth_is_bounded() {
        let (mut session, backend) = setup(UNDO_CAPACITY + 2).await;
        for i in 0..UNDO_CAPACITY + 2 {
            session.current_index = i;
            session.record_pass(&backend, REVIEWER).await.unwrap();
        }
        assert_eq!(session.undo_depth(), UNDO_CAPACITY);
    }

    #[tokio::test]
    async fn test_no_current_trace_at_end_of_list() {
        let (mut session, backend) = setup(1).await;
        session.current_index = 1;
        let err = session.record_pass(&backend, REVIEWER).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotFound(_)));
    }
}
