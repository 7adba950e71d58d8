//! Review session aggregate and its checkpoint document
//!
//! A `ReviewSession` exclusively owns its traces, the undo history and any
//! in-progress fail draft. The tag registry is a cache of the global tag
//! library. The annotation workflow, navigation and progress operations are
//! implemented on this type in their own modules.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ReviewError, ReviewResult, StorageError};
use crate::models::{AxialTag, SessionInfo, Trace};
use crate::tag_registry::TagRegistry;
use crate::trace_set::TraceSet;
use crate::undo::UndoStack;
use crate::workflow::FailDraft;

#[derive(Debug, Clone)]
pub struct ReviewSession {
    pub(crate) info: SessionInfo,
    pub(crate) traces: TraceSet,
    pub(crate) tags: TagRegistry,
    /// `traces.len()` means past the last trace (review complete)
    pub(crate) current_index: usize,
    pub(crate) undo: UndoStack,
    pub(crate) fail_draft: Option<FailDraft>,
}

impl ReviewSession {
    pub fn new(info: SessionInfo, traces: Vec<Trace>, tags: Vec<AxialTag>) -> Self {
        Self {
            info,
            traces: TraceSet::new(traces),
            tags: TagRegistry::new(tags),
            current_index: 0,
            undo: UndoStack::new(),
            fail_draft: None,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn traces(&self) -> &TraceSet {
        &self.traces
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub(crate) fn tags_mut(&mut self) -> &mut TagRegistry {
        &mut self.tags
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn fail_draft(&self) -> Option<&FailDraft> {
        self.fail_draft.as_ref()
    }

    /// Checkpoint document for the durable store
    ///
    /// The undo history and fail draft are not part of it; a restored session
    /// starts with an empty undo stack.
    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.info.clone(),
            traces: self.traces.as_slice().to_vec(),
            tags: self.tags.all().to_vec(),
            current_trace_index: self.current_index,
        }
    }

    /// Rebuild a session from a checkpoint, rejecting documents that break
    /// the trace invariants
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, StorageError> {
        snapshot.validate()?;
        let mut session = Self::new(snapshot.session, snapshot.traces, snapshot.tags);
        session.current_index = snapshot.current_trace_index;
        Ok(session)
    }

    pub(crate) fn require_current_index(&self) -> ReviewResult<usize> {
        if self.current_index < self.traces.len() {
            Ok(self.current_index)
        } else {
            Err(ReviewError::NotFound("No current trace".to_string()))
        }
    }
}

/// Persisted layout: `{session, traces, tags, currentTraceIndex}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: SessionInfo,
    pub traces: Vec<Trace>,
    #[serde(default)]
    pub tags: Vec<AxialTag>,
    #[serde(default)]
    pub current_trace_index: usize,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.current_trace_index > self.traces.len() {
            return Err(StorageError::Corrupt(format!(
                "current trace index {} beyond {} traces",
                self.current_trace_index,
                self.traces.len()
            )));
        }

        let mut seen = HashSet::new();
        for trace in &self.traces {
            if !trace.is_consistent() {
                return Err(StorageError::Corrupt(format!(
                    "trace {} has reviewed={} but pass_fail={:?}",
                    trace.id, trace.reviewed, trace.pass_fail
                )));
            }
            if !seen.insert(trace.id.as_str()) {
                return Err(StorageError::Corrupt(format!(
                    "duplicate trace id {}",
                    trace.id
                )));
            }
        }
        Ok(())
    }
}
