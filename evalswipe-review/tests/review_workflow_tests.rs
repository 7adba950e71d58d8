//! Review workflow integration tests
//!
//! Drives the session manager end to end against the in-process backend and
//! store, the way the terminal driver does.

use std::sync::Arc;

use evalswipe_common::{EventBus, ReviewEvent};
use evalswipe_review::backend::{BackendError, InMemoryBackend};
use evalswipe_review::models::{SessionConfig, Trace, TraceSource, Verdict};
use evalswipe_review::store::MemoryStore;
use evalswipe_review::undo::UNDO_CAPACITY;
use evalswipe_review::workflow::{ReviewPhase, SubmitOutcome, TagPath, UndoOutcome};
use evalswipe_review::{ReviewError, SessionManager};

const NOTE: &str = "Suggested a chip flavor that is not in the catalog";

fn traces(ids: &[&str]) -> Vec<Trace> {
    ids.iter()
        .map(|id| Trace::new(*id, format!("question {}", id), format!("answer {}", id)))
        .collect()
}

async fn started(ids: &[&str]) -> (SessionManager, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    let mut manager = SessionManager::new(
        backend.clone(),
        Arc::new(MemoryStore::new()),
        EventBus::new(256),
        "current_user",
    );
    manager
        .create_session("Demo Session", traces(ids), SessionConfig::for_source(TraceSource::Demo))
        .await
        .unwrap();
    (manager, backend)
}

fn assert_invariant(manager: &SessionManager) {
    for trace in manager.session().unwrap().traces().iter() {
        assert_eq!(
            trace.reviewed,
            trace.pass_fail.is_some(),
            "reviewed/pass_fail disagree on {}",
            trace.id
        );
    }
}

#[tokio::test]
async fn test_pass_then_advance_to_next() {
    // Given: a session with two unreviewed traces
    let (mut manager, _) = started(&["A", "B"]).await;

    // When: the reviewer passes A
    let view = manager.record_pass().await.unwrap();

    // Then: A is reviewed as pass and B is current
    let a = manager.session().unwrap().traces().get(0).unwrap();
    assert!(a.reviewed);
    assert_eq!(a.pass_fail, Some(Verdict::Pass));
    assert_eq!(view.current_index, 1);
    assert_eq!(view.current_trace.unwrap().id, "B");
    assert_invariant(&manager);
}

#[tokio::test]
async fn test_tag_now_and_tag_later_open_code_rules() {
    // Given: the reviewer started failing the first trace
    let (mut manager, backend) = started(&["A", "B"]).await;
    manager.begin_fail_flow().unwrap();

    // When: a 5-character note is submitted on the tag-now path
    let err = manager
        .submit_open_code("short", TagPath::Now)
        .await
        .unwrap_err();

    // Then: it is rejected and the trace still awaits its open code
    assert!(matches!(err, ReviewError::Validation(_)));
    assert_eq!(
        manager.session().unwrap().phase_of(0).unwrap(),
        ReviewPhase::AwaitingOpenCode
    );

    // When: the same note goes through the tag-later path
    let outcome = manager
        .submit_open_code("short", TagPath::Later)
        .await
        .unwrap();

    // Then: the failure is recorded with no tags
    assert!(matches!(outcome, SubmitOutcome::Recorded(_)));
    let a = manager.session().unwrap().traces().get(0).unwrap();
    assert_eq!(a.pass_fail, Some(Verdict::Fail));
    assert!(a.axial_tags.is_empty());
    assert_eq!(backend.annotations().await[0].open_code.as_deref(), Some("short"));
    assert_invariant(&manager);
}

#[tokio::test]
async fn test_short_tag_description_leaves_registry_unchanged() {
    // Given: a running session
    let (mut manager, _) = started(&["A"]).await;

    // When: a tag with a too-short description is created
    let err = manager.create_tag("A", "too short", "#fff").await.unwrap_err();

    // Then: validation fails and no tag is registered
    assert!(matches!(err, ReviewError::Validation(_)));
    assert!(manager.session().unwrap().tags().is_empty());
}

#[tokio::test]
async fn test_backend_failure_on_pass_changes_nothing() {
    // Given: a session whose backend will drop the next call
    let (mut manager, backend) = started(&["A", "B"]).await;
    backend
        .fail_next(BackendError::Network("connection refused".to_string()))
        .await;

    // When: the reviewer passes A
    let err = manager.record_pass().await.unwrap_err();

    // Then: a backend error is reported, A is unreviewed, undo is empty
    assert!(matches!(err, ReviewError::Backend(_)));
    let session = manager.session().unwrap();
    assert!(!session.traces().get(0).unwrap().reviewed);
    assert_eq!(session.undo_depth(), 0);
    assert_eq!(session.current_index(), 0);

    // And: re-issuing the command succeeds
    manager.record_pass().await.unwrap();
    assert_eq!(backend.annotations().await.len(), 1);
}

#[tokio::test]
async fn test_full_fail_flow_with_new_tag() {
    // Given: a session and a fail draft past the open-code step
    let (mut manager, backend) = started(&["A", "B"]).await;
    manager.begin_fail_flow().unwrap();
    manager.submit_open_code(NOTE, TagPath::Now).await.unwrap();

    // When: a tag is created, selected and applied
    let tag = manager
        .create_tag("Hallucination", "Agent invented facts not present in data", "#EF4444")
        .await
        .unwrap();
    manager.toggle_axial_tag(&tag.id).unwrap();
    let view = manager.commit_fail_with_tags().await.unwrap();

    // Then: A carries the note and the tag, and B is current
    let a = manager.session().unwrap().traces().get(0).unwrap();
    assert_eq!(a.open_code.as_deref(), Some(NOTE));
    assert_eq!(a.axial_tags, vec![tag.id.clone()]);
    assert_eq!(view.current_index, 1);
    assert_eq!(backend.annotations().await[0].axial_tags, vec![tag.id]);
}

#[tokio::test]
async fn test_undo_restores_and_navigates_back() {
    // Given: A was passed and B is current
    let (mut manager, _) = started(&["A", "B"]).await;
    let before = manager.session().unwrap().traces().get(0).unwrap().clone();
    manager.record_pass().await.unwrap();

    // When: the reviewer undoes
    let outcome = manager.undo().await.unwrap();

    // Then: A is back exactly as it was and is current again
    assert!(matches!(outcome, UndoOutcome::Restored { trace_index: 0, .. }));
    let session = manager.session().unwrap();
    assert_eq!(session.traces().get(0).unwrap(), &before);
    assert_eq!(session.current_index(), 0);

    // And: a second undo has nothing to do
    assert_eq!(manager.undo().await.unwrap(), UndoOutcome::NothingToUndo);
}

#[tokio::test]
async fn test_undo_history_keeps_last_ten() {
    // Given: twelve traces, all passed in order
    let ids: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let (mut manager, _) = started(&id_refs).await;
    for _ in 0..12 {
        manager.record_pass().await.unwrap();
    }

    // When: undoing until nothing is left
    let mut restored = Vec::new();
    while let UndoOutcome::Restored { trace_index, .. } = manager.undo().await.unwrap() {
        restored.push(trace_index);
    }

    // Then: only the ten most recent decisions came back, newest first
    assert_eq!(restored.len(), UNDO_CAPACITY);
    assert_eq!(restored, (2..12).rev().collect::<Vec<_>>());
    let session = manager.session().unwrap();
    assert!(session.traces().get(0).unwrap().reviewed);
    assert!(!session.traces().get(2).unwrap().reviewed);
}

#[tokio::test]
async fn test_review_complete_reports_end_of_list() {
    // Given: a single-trace session with a subscriber
    let (mut manager, _) = started(&["A"]).await;
    let mut rx = manager.events().subscribe();

    // When: the only trace is deferred
    let view = manager.record_defer().await.unwrap();

    // Then: the cursor sits past the end and completion is announced
    assert_eq!(view.current_index, 1);
    assert!(view.current_trace.is_none());
    assert_eq!(view.progress.percentage, 100);

    let mut complete = false;
    while let Ok(event) = rx.try_recv() {
        if let ReviewEvent::ReviewComplete { reviewed, total } = event {
            assert_eq!((reviewed, total), (1, 1));
            complete = true;
        }
    }
    assert!(complete);

    // And: further decisions are refused without error to the process
    assert!(matches!(
        manager.record_pass().await,
        Err(ReviewError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_advance_does_not_wrap_to_earlier_unreviewed() {
    // Given: the reviewer skipped A and is on C
    let (mut manager, _) = started(&["A", "B", "C"]).await;
    manager.go_to(2).await.unwrap();

    // When: C is passed
    let view = manager.record_pass().await.unwrap();

    // Then: no wrap back to A; end-of-list state instead
    assert_eq!(view.current_index, 3);
    assert_eq!(view.progress.reviewed, 1);
}

#[tokio::test]
async fn test_navigation_errors_are_not_fatal() {
    let (mut manager, _) = started(&["A", "B"]).await;

    assert!(matches!(
        manager.go_to(5).await,
        Err(ReviewError::NotFound(_))
    ));
    assert_eq!(manager.go_previous().await.unwrap().current_index, 0);
    assert_eq!(manager.go_next().await.unwrap().current_index, 1);
    assert_eq!(manager.go_next().await.unwrap().current_index, 1);
}

#[tokio::test]
async fn test_next_after_completion_stays_at_end() {
    // Given: every trace has been decided
    let (mut manager, _) = started(&["A", "B"]).await;
    manager.record_pass().await.unwrap();
    manager.record_pass().await.unwrap();

    // When: the reviewer steps forward from the end-of-list state
    let view = manager.go_next().await.unwrap();

    // Then: nothing moves
    assert_eq!(view.current_index, 2);
    assert!(view.current_trace.is_none());
}
