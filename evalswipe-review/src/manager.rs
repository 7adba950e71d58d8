//! Session lifecycle manager
//!
//! Owns the active `ReviewSession` and the collaborators around it. Every
//! command runs to completion before the next one starts (`&mut self`), and
//! every command that changes persisted state ends with a checkpoint. A failed
//! checkpoint is logged and published as `CheckpointFailed`; it never undoes
//! a decision the backend already accepted.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use evalswipe_common::{time, EventBus, ReviewEvent};

use crate::backend::{
    BackendError, BraintrustImportRequest, CreateSessionRequest, ReviewBackend, TagMerge,
};
use crate::error::{ReviewError, ReviewResult, StorageError};
use crate::export::SessionExport;
use crate::history::{HistoryEntry, HistoryFilter, HistorySort, HistoryStats};
use crate::import::braintrust_session_name;
use crate::models::{AxialTag, NewTag, SessionConfig, Trace, TraceSource};
use crate::navigation::Advance;
use crate::progress::Progress;
use crate::session::{ReviewSession, SessionSnapshot};
use crate::store::{DurableStore, SESSION_KEY};
use crate::workflow::{Decision, FailDraft, SubmitOutcome, TagPath, UndoOutcome};

/// What the presentation layer renders after each command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Option<String>,
    pub current_index: usize,
    pub current_trace: Option<Trace>,
    pub progress: Progress,
}

impl SessionView {
    fn empty() -> Self {
        Self {
            session_id: None,
            current_index: 0,
            current_trace: None,
            progress: Progress::default(),
        }
    }

    fn of(session: &ReviewSession) -> Self {
        Self {
            session_id: Some(session.id().to_string()),
            current_index: session.current_index(),
            current_trace: session.current_trace().cloned(),
            progress: session.progress(),
        }
    }
}

pub struct SessionManager {
    backend: Arc<dyn ReviewBackend>,
    store: Arc<dyn DurableStore>,
    events: EventBus,
    reviewer_id: String,
    session: Option<ReviewSession>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn ReviewBackend>,
        store: Arc<dyn DurableStore>,
        events: EventBus,
        reviewer_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            events,
            reviewer_id: reviewer_id.into(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&ReviewSession> {
        self.session.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn reviewer_id(&self) -> &str {
        &self.reviewer_id
    }

    pub fn set_reviewer_id(&mut self, reviewer_id: impl Into<String>) {
        self.reviewer_id = reviewer_id.into();
    }

    pub fn view(&self) -> SessionView {
        self.session
            .as_ref()
            .map(SessionView::of)
            .unwrap_or_else(SessionView::empty)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a session through the backend and make it current
    ///
    /// The backend assigns the session id and returns the traces and tag
    /// library the session starts from. Replaces any existing session.
    pub async fn create_session(
        &mut self,
        name: &str,
        traces: Vec<Trace>,
        config: SessionConfig,
    ) -> ReviewResult<SessionView> {
        let request = CreateSessionRequest {
            name: name.to_string(),
            traces,
            config,
        };
        info!(name = name, traces = request.traces.len(), "Creating session");

        let mut created = self.backend.create_session(&request).await?;
        check_backend_traces(&mut created.traces)?;
        let session = ReviewSession::new(created.info, created.traces, created.axial_tags);

        self.events.emit_lossy(ReviewEvent::SessionStarted {
            session_id: session.id().to_string(),
            name: session.info().name.clone(),
            total_traces: session.traces().len(),
            timestamp: time::now(),
        });
        info!(
            session_id = %session.id(),
            total = session.traces().len(),
            "Session started"
        );

        self.session = Some(session);
        self.checkpoint_or_report().await;
        Ok(self.view())
    }

    /// Fetch traces from Braintrust through the backend and start a session
    pub async fn import_braintrust(
        &mut self,
        request: &BraintrustImportRequest,
    ) -> ReviewResult<SessionView> {
        let traces = self.backend.import_braintrust(request).await?;
        info!(
            experiment_id = %request.experiment_id,
            imported = traces.len(),
            "Imported traces from Braintrust"
        );

        self.create_session(
            &braintrust_session_name(&request.experiment_id),
            traces,
            SessionConfig::for_source(TraceSource::Braintrust),
        )
        .await
    }

    /// Load the checkpointed session, if there is a usable one
    ///
    /// A missing, unreadable or invalid checkpoint leaves the manager with no
    /// session; that is "nothing to restore", not an error.
    pub async fn restore_session(&mut self) -> Option<SessionView> {
        let raw = match self.store.load(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No session checkpoint to restore");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Could not read session checkpoint");
                return None;
            }
        };

        let session = match SessionSnapshot::from_json(&raw).and_then(ReviewSession::from_snapshot)
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Ignoring unusable session checkpoint");
                return None;
            }
        };

        info!(
            session_id = %session.id(),
            current_index = session.current_index(),
            "Session restored"
        );
        self.events.emit_lossy(ReviewEvent::SessionRestored {
            session_id: session.id().to_string(),
            current_index: session.current_index(),
            timestamp: time::now(),
        });
        self.session = Some(session);
        Some(self.view())
    }

    /// Discard the session and its checkpoint; cannot be undone
    ///
    /// The in-memory session is gone even if removing the checkpoint fails.
    pub async fn clear_session(&mut self) -> ReviewResult<()> {
        if let Some(session) = self.session.take() {
            info!(session_id = %session.id(), "Session cleared");
        }
        self.events.emit_lossy(ReviewEvent::SessionCleared {
            timestamp: time::now(),
        });
        self.store.remove(SESSION_KEY).await?;
        Ok(())
    }

    /// Write the current session to the durable store
    pub async fn checkpoint(&self) -> Result<(), StorageError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let json = session.to_snapshot().to_json()?;
        self.store.save(SESSION_KEY, &json).await?;
        debug!(session_id = %session.id(), bytes = json.len(), "Checkpoint written");
        Ok(())
    }

    async fn checkpoint_or_report(&self) {
        if let Err(e) = self.checkpoint().await {
            warn!(error = %e, "Checkpoint failed; latest change may be lost on restart");
            self.events.emit_lossy(ReviewEvent::CheckpointFailed {
                message: e.to_string(),
            });
        }
    }

    fn active(&self) -> ReviewResult<&ReviewSession> {
        self.session.as_ref().ok_or(ReviewError::NoSession)
    }

    fn active_mut(&mut self) -> ReviewResult<&mut ReviewSession> {
        self.session.as_mut().ok_or(ReviewError::NoSession)
    }

    // ------------------------------------------------------------------
    // Annotation workflow
    // ------------------------------------------------------------------

    pub async fn record_pass(&mut self) -> ReviewResult<SessionView> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        let decision = session
            .record_pass(self.backend.as_ref(), &self.reviewer_id)
            .await?;
        Ok(self.after_decision(decision).await)
    }

    pub async fn record_defer(&mut self) -> ReviewResult<SessionView> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        let decision = session
            .record_defer(self.backend.as_ref(), &self.reviewer_id)
            .await?;
        Ok(self.after_decision(decision).await)
    }

    pub fn begin_fail_flow(&mut self) -> ReviewResult<FailDraft> {
        Ok(self.active_mut()?.begin_fail_flow()?.clone())
    }

    /// Submit the open code of the failure being drafted
    ///
    /// On the tag-now path the tag library is refreshed from the backend; a
    /// failed refresh is logged and the draft stays in place.
    pub async fn submit_open_code(
        &mut self,
        text: &str,
        path: TagPath,
    ) -> ReviewResult<SubmitOutcome> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        let outcome = session
            .submit_open_code(self.backend.as_ref(), &self.reviewer_id, text, path)
            .await?;

        match &outcome {
            SubmitOutcome::AwaitingAxialTags => {
                if let Err(e) = self.refresh_tags().await {
                    warn!(error = %e, "Failed to load tags");
                }
            }
            SubmitOutcome::Recorded(decision) => {
                self.after_decision(decision.clone()).await;
            }
        }
        Ok(outcome)
    }

    pub fn toggle_axial_tag(&mut self, tag_id: &str) -> ReviewResult<bool> {
        self.active_mut()?.toggle_axial_tag(tag_id)
    }

    pub async fn commit_fail_with_tags(&mut self) -> ReviewResult<SessionView> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        let decision = session
            .commit_fail_with_tags(self.backend.as_ref(), &self.reviewer_id)
            .await?;
        Ok(self.after_decision(decision).await)
    }

    pub fn cancel_fail_flow(&mut self) -> ReviewResult<bool> {
        Ok(self.active_mut()?.cancel_fail_flow())
    }

    pub async fn undo(&mut self) -> ReviewResult<UndoOutcome> {
        let outcome = self.active_mut()?.undo()?;
        if let UndoOutcome::Restored {
            trace_index,
            trace_id,
        } = &outcome
        {
            self.events.emit_lossy(ReviewEvent::DecisionUndone {
                trace_id: trace_id.clone(),
                trace_index: *trace_index,
                timestamp: time::now(),
            });
            self.emit_current_trace();
            self.checkpoint_or_report().await;
        }
        Ok(outcome)
    }

    async fn after_decision(&mut self, decision: Decision) -> SessionView {
        let Some(session) = self.session.as_mut() else {
            return SessionView::empty();
        };

        let progress = session.progress();
        self.events.emit_lossy(ReviewEvent::TraceAnnotated {
            trace_id: decision.trace_id.clone(),
            trace_index: decision.trace_index,
            verdict: decision.verdict.as_str().to_string(),
            reviewed: progress.reviewed,
            total: progress.total,
            timestamp: time::now(),
        });

        if session.advance_after_decision() == Advance::Complete {
            info!(
                reviewed = progress.reviewed,
                total = progress.total,
                "No unreviewed traces ahead"
            );
            self.events.emit_lossy(ReviewEvent::ReviewComplete {
                reviewed: progress.reviewed,
                total: progress.total,
            });
        }
        self.emit_current_trace();
        self.checkpoint_or_report().await;
        self.view()
    }

    // ------------------------------------------------------------------
    // Navigation and read models
    // ------------------------------------------------------------------

    pub async fn go_to(&mut self, index: usize) -> ReviewResult<SessionView> {
        self.active_mut()?.go_to(index)?;
        self.after_navigation().await
    }

    pub async fn go_next(&mut self) -> ReviewResult<SessionView> {
        self.active_mut()?.go_next();
        self.after_navigation().await
    }

    pub async fn go_previous(&mut self) -> ReviewResult<SessionView> {
        self.active_mut()?.go_previous();
        self.after_navigation().await
    }

    async fn after_navigation(&mut self) -> ReviewResult<SessionView> {
        self.emit_current_trace();
        self.checkpoint_or_report().await;
        Ok(self.view())
    }

    fn emit_current_trace(&self) {
        if let Some(session) = &self.session {
            self.events.emit_lossy(ReviewEvent::CurrentTraceChanged {
                trace_index: session.current_index(),
                trace_id: session.current_trace().map(|trace| trace.id.clone()),
            });
        }
    }

    pub fn progress(&self) -> ReviewResult<Progress> {
        Ok(self.active()?.progress())
    }

    pub fn history(
        &self,
        filter: HistoryFilter,
        sort: HistorySort,
    ) -> ReviewResult<Vec<HistoryEntry>> {
        Ok(self.active()?.history(filter, sort))
    }

    pub fn history_stats(&self) -> ReviewResult<HistoryStats> {
        Ok(self.active()?.history_stats())
    }

    pub fn export(&self) -> ReviewResult<SessionExport> {
        Ok(SessionExport::from_session(self.active()?, time::now()))
    }

    // ------------------------------------------------------------------
    // Tag library
    // ------------------------------------------------------------------

    /// Validate and create a tag, then register it locally
    ///
    /// Works without a session; the tag is only cached when one is loaded.
    pub async fn create_tag(
        &mut self,
        name: &str,
        description: &str,
        color: &str,
    ) -> ReviewResult<AxialTag> {
        let request = NewTag::new(name, description, color);
        request.validate()?;

        let tag = self.backend.create_tag(&request).await?;
        info!(tag_id = %tag.id, name = %tag.name, "Tag created");
        self.events.emit_lossy(ReviewEvent::TagCreated {
            tag_id: tag.id.clone(),
            name: tag.name.clone(),
        });

        if let Some(session) = self.session.as_mut() {
            session.tags_mut().upsert(tag.clone());
            self.checkpoint_or_report().await;
        }
        Ok(tag)
    }

    /// Replace the cached tag library with the backend's; returns the tag count
    pub async fn refresh_tags(&mut self) -> ReviewResult<usize> {
        let tags = self.backend.get_tags().await?;
        let count = tags.len();
        if let Some(session) = self.session.as_mut() {
            session.tags_mut().replace_all(tags);
            self.checkpoint_or_report().await;
        }
        debug!(count = count, "Tag library refreshed");
        Ok(count)
    }

    pub async fn update_tag(
        &mut self,
        tag_id: &str,
        name: &str,
        description: &str,
        color: &str,
    ) -> ReviewResult<AxialTag> {
        let request = NewTag::new(name, description, color);
        request.validate()?;

        let tag = self.backend.update_tag(tag_id, &request).await?;
        if let Some(session) = self.session.as_mut() {
            session.tags_mut().upsert(tag.clone());
            self.checkpoint_or_report().await;
        }
        Ok(tag)
    }

    /// Delete a tag; trace tag lists are left alone locally
    pub async fn delete_tag(&mut self, tag_id: &str, untag_traces: bool) -> ReviewResult<usize> {
        let affected = self.backend.delete_tag(tag_id, untag_traces).await?;
        info!(tag_id = tag_id, traces_affected = affected, "Tag deleted");
        if let Some(session) = self.session.as_mut() {
            session.tags_mut().remove(tag_id);
            self.checkpoint_or_report().await;
        }
        Ok(affected)
    }

    pub async fn merge_tags(
        &mut self,
        source_tag_id: &str,
        target_tag_id: &str,
    ) -> ReviewResult<TagMerge> {
        if source_tag_id == target_tag_id {
            return Err(ReviewError::Validation(
                "Cannot merge a tag into itself".to_string(),
            ));
        }

        let merge = self
            .backend
            .merge_tags(source_tag_id, target_tag_id)
            .await?;
        info!(
            source = source_tag_id,
            target = target_tag_id,
            traces_affected = merge.traces_affected,
            "Tags merged"
        );
        if let Some(session) = self.session.as_mut() {
            let tags = session.tags_mut();
            tags.remove(source_tag_id);
            tags.upsert(merge.merged_tag.clone());
            self.checkpoint_or_report().await;
        }
        Ok(merge)
    }
}

/// Reject duplicate ids and repair `reviewed`/`pass_fail` disagreement in
/// traces the backend hands back
fn check_backend_traces(traces: &mut [Trace]) -> Result<(), BackendError> {
    let mut seen = HashSet::new();
    for trace in traces.iter_mut() {
        if !seen.insert(trace.id.clone()) {
            return Err(BackendError::Parse(format!(
                "Backend returned duplicate trace id '{}'",
                trace.id
            )));
        }
        if trace.normalize_review_fields() {
            warn!(trace_id = %trace.id, "Backend trace had inconsistent review fields");
        }
    }
    Ok(())
}
