//! Backend API collaborator
//!
//! The backend is authoritative for session ids, trace ids and tags. The
//! engine only distinguishes success from failure; retries are a manual
//! reviewer action.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Annotation, AxialTag, NewTag, SessionConfig, SessionInfo, Trace};

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// Backend client errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Session creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub traces: Vec<Trace>,
    pub config: SessionConfig,
}

/// Session as returned by the backend after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSession {
    #[serde(flatten)]
    pub info: SessionInfo,
    #[serde(default)]
    pub traces: Vec<Trace>,
    #[serde(default)]
    pub axial_tags: Vec<AxialTag>,
}

/// Result of merging one tag into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMerge {
    pub merged_tag: AxialTag,
    pub traces_affected: usize,
}

/// Optional Braintrust fetch filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BraintrustFilters {
    pub limit: u32,
}

impl Default for BraintrustFilters {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

/// Import request for traces held in a Braintrust experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BraintrustImportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub project_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub filters: BraintrustFilters,
}

#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// Create a session; the backend assigns the session id
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<BackendSession, BackendError>;

    /// Persist one decision for a trace
    async fn create_annotation(&self, annotation: &Annotation) -> Result<(), BackendError>;

    async fn get_tags(&self) -> Result<Vec<AxialTag>, BackendError>;

    async fn create_tag(&self, tag: &NewTag) -> Result<AxialTag, BackendError>;

    async fn update_tag(&self, tag_id: &str, tag: &NewTag) -> Result<AxialTag, BackendError>;

    /// Delete a tag; returns how many traces were untagged server-side
    async fn delete_tag(&self, tag_id: &str, untag_traces: bool) -> Result<usize, BackendError>;

    async fn merge_tags(&self, source_tag_id: &str, target_tag_id: &str)
        -> Result<TagMerge, BackendError>;

    /// Fetch traces from a Braintrust experiment through the backend
    async fn import_braintrust(
        &self,
        request: &BraintrustImportRequest,
    ) -> Result<Vec<Trace>, BackendError>;
}
