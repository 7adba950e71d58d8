//! In-process backend
//!
//! Mirrors the server's behavior closely enough for offline review and for
//! tests: id assignment, duplicate tag names, delete/merge bookkeeping.
//! `fail_next` makes the next call fail once, like a dropped connection.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    BackendError, BackendSession, BraintrustImportRequest, CreateSessionRequest, ReviewBackend,
    TagMerge,
};
use crate::models::{Annotation, AxialTag, NewTag, SessionInfo, Trace};

#[derive(Default)]
struct State {
    sessions: HashMap<String, BackendSession>,
    traces: HashMap<String, Trace>,
    tags: Vec<AxialTag>,
    annotations: Vec<Annotation>,
    braintrust_traces: Vec<Trace>,
    fail_next: Option<BackendError>,
}

impl State {
    fn take_failure(&mut self) -> Result<(), BackendError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn tag_index(&self, tag_id: &str) -> Result<usize, BackendError> {
        self.tags
            .iter()
            .position(|tag| tag.id == tag_id)
            .ok_or_else(|| not_found(format!("Tag {} not found", tag_id)))
    }

    fn check_duplicate_name(&self, name: &str, except_id: Option<&str>) -> Result<(), BackendError> {
        let duplicate = self.tags.iter().any(|tag| {
            Some(tag.id.as_str()) != except_id && tag.name.to_lowercase() == name.to_lowercase()
        });
        if duplicate {
            return Err(BackendError::Api {
                status: 400,
                detail: format!("Tag with name '{}' already exists", name),
            });
        }
        Ok(())
    }
}

fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}

fn not_found(detail: String) -> BackendError {
    BackendError::Api {
        status: 404,
        detail,
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tag library
    pub fn with_tags(tags: Vec<AxialTag>) -> Self {
        Self {
            state: Mutex::new(State {
                tags,
                ..Default::default()
            }),
        }
    }

    /// Make previously created traces and tags known, e.g. after a session
    /// was restored from a checkpoint
    pub async fn seed(&self, traces: &[Trace], tags: &[AxialTag]) {
        let mut state = self.state.lock().await;
        for trace in traces {
            state.traces.insert(trace.id.clone(), trace.clone());
        }
        for tag in tags {
            if !state.tags.iter().any(|existing| existing.id == tag.id) {
                state.tags.push(tag.clone());
            }
        }
    }

    /// Traces served by `import_braintrust`
    pub async fn set_braintrust_traces(&self, traces: Vec<Trace>) {
        self.state.lock().await.braintrust_traces = traces;
    }

    /// Make the next backend call fail with `error`
    pub async fn fail_next(&self, error: BackendError) {
        self.state.lock().await.fail_next = Some(error);
    }

    /// Every annotation accepted so far, oldest first
    pub async fn annotations(&self) -> Vec<Annotation> {
        self.state.lock().await.annotations.clone()
    }

    pub async fn tags(&self) -> Vec<AxialTag> {
        self.state.lock().await.tags.clone()
    }

    pub async fn trace(&self, trace_id: &str) -> Option<Trace> {
        self.state.lock().await.traces.get(trace_id).cloned()
    }
}

#[async_trait]
impl ReviewBackend for InMemoryBackend {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<BackendSession, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let name = if request.name.trim().is_empty() {
            format!("Session {}", Utc::now().format("%Y-%m-%d %H:%M"))
        } else {
            request.name.clone()
        };

        let session = BackendSession {
            info: SessionInfo {
                id: short_id("session"),
                name,
                created_at: Some(Utc::now()),
                mode: request.config.mode,
                source: request.config.source,
                randomize_order: request.config.randomize_order,
            },
            traces: request.traces.clone(),
            axial_tags: state.tags.clone(),
        };

        for trace in &request.traces {
            state.traces.insert(trace.id.clone(), trace.clone());
        }
        state
            .sessions
            .insert(session.info.id.clone(), session.clone());

        debug!(session_id = %session.info.id, traces = session.traces.len(), "In-memory session created");
        Ok(session)
    }

    async fn create_annotation(&self, annotation: &Annotation) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let trace = state
            .traces
            .get_mut(&annotation.trace_id)
            .ok_or_else(|| not_found(format!("Trace {} not found", annotation.trace_id)))?;
        trace.reviewed = true;
        trace.pass_fail = Some(annotation.pass_fail);
        trace.open_code = annotation.open_code.clone();
        trace.axial_tags = annotation.axial_tags.clone();
        trace.reviewer_id = annotation.reviewer_id.clone();
        trace.reviewed_at = Some(Utc::now());

        state.annotations.push(annotation.clone());
        Ok(())
    }

    async fn get_tags(&self) -> Result<Vec<AxialTag>, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        Ok(state.tags.clone())
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<AxialTag, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.check_duplicate_name(&tag.name, None)?;

        let created = AxialTag {
            id: short_id("tag"),
            name: tag.name.clone(),
            description: tag.description.clone(),
            color: tag.color.clone(),
            usage_count: 0,
            examples: Vec::new(),
            created_at: Some(Utc::now()),
        };
        state.tags.push(created.clone());
        Ok(created)
    }

    async fn update_tag(&self, tag_id: &str, tag: &NewTag) -> Result<AxialTag, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let index = state.tag_index(tag_id)?;
        state.check_duplicate_name(&tag.name, Some(tag_id))?;

        let existing = &mut state.tags[index];
        existing.name = tag.name.clone();
        existing.description = tag.description.clone();
        existing.color = tag.color.clone();
        Ok(existing.clone())
    }

    async fn delete_tag(&self, tag_id: &str, untag_traces: bool) -> Result<usize, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let index = state.tag_index(tag_id)?;

        let mut affected = 0;
        if untag_traces {
            for trace in state.traces.values_mut() {
                if let Some(position) = trace.axial_tags.iter().position(|id| id == tag_id) {
                    trace.axial_tags.remove(position);
                    affected += 1;
                }
            }
        }
        state.tags.remove(index);
        Ok(affected)
    }

    async fn merge_tags(
        &self,
        source_tag_id: &str,
        target_tag_id: &str,
    ) -> Result<TagMerge, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let source_index = state.tag_index(source_tag_id)?;
        let target_index = state.tag_index(target_tag_id)?;

        let mut affected = 0;
        for trace in state.traces.values_mut() {
            if let Some(position) = trace.axial_tags.iter().position(|id| id == source_tag_id) {
                trace.axial_tags.remove(position);
                if !trace.axial_tags.iter().any(|id| id == target_tag_id) {
                    trace.axial_tags.push(target_tag_id.to_string());
                }
                affected += 1;
            }
        }

        let source = state.tags[source_index].clone();
        let target = &mut state.tags[target_index];
        target.usage_count += source.usage_count;
        target.examples.extend(source.examples);
        let merged_tag = target.clone();
        state.tags.remove(source_index);

        Ok(TagMerge {
            merged_tag,
            traces_affected: affected,
        })
    }

    async fn import_braintrust(
        &self,
        request: &BraintrustImportRequest,
    ) -> Result<Vec<Trace>, BackendError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        Ok(state
            .braintrust_traces
            .iter()
            .take(request.filters.limit as usize)
            .cloned()
            .collect())
    }
}
