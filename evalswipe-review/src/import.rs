//! Trace sources: uploaded JSON files and Braintrust experiments

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::backend::{BraintrustFilters, BraintrustImportRequest};
use crate::error::{ReviewError, ReviewResult};
use crate::models::Trace;

pub const DEMO_SESSION_NAME: &str = "Demo Session";

const INVALID_FORMAT: &str = "Invalid file format. Expected array of traces.";

/// Parse an uploaded trace file
///
/// Accepts `{"traces": [...]}` or a bare array. Review fields that disagree
/// are normalized so `reviewed` follows `pass_fail`.
pub fn parse_trace_file(raw: &str) -> ReviewResult<Vec<Trace>> {
    let data: Value = serde_json::from_str(raw)
        .map_err(|e| ReviewError::Validation(format!("Invalid JSON: {}", e)))?;

    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("traces") {
            Some(Value::Array(items)) => items,
            _ => return Err(ReviewError::Validation(INVALID_FORMAT.to_string())),
        },
        _ => return Err(ReviewError::Validation(INVALID_FORMAT.to_string())),
    };

    let mut traces = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for (position, item) in items.into_iter().enumerate() {
        let mut trace: Trace = serde_json::from_value(item).map_err(|e| {
            ReviewError::Validation(format!("Trace {} is invalid: {}", position + 1, e))
        })?;

        if !seen.insert(trace.id.clone()) {
            return Err(ReviewError::Validation(format!(
                "Duplicate trace id '{}'",
                trace.id
            )));
        }
        if trace.normalize_review_fields() {
            warn!(trace_id = %trace.id, "Imported trace had inconsistent review fields");
        }
        traces.push(trace);
    }
    Ok(traces)
}

/// Session name for an uploaded file: `Imported from <file name>`
pub fn upload_session_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("Imported from {}", file_name)
}

pub fn braintrust_session_name(experiment_id: &str) -> String {
    format!("Braintrust - {}", experiment_id)
}

impl BraintrustImportRequest {
    /// Build a validated request; blank ids are rejected, a missing or zero
    /// limit means 100
    pub fn new(
        api_key: Option<&str>,
        project_id: &str,
        experiment_id: &str,
        limit: Option<u32>,
    ) -> ReviewResult<Self> {
        let project_id = project_id.trim();
        let experiment_id = experiment_id.trim();
        if project_id.is_empty() || experiment_id.is_empty() {
            return Err(ReviewError::Validation(
                "Project ID and Experiment ID are required".to_string(),
            ));
        }

        let filters = match limit {
            Some(limit) if limit > 0 => BraintrustFilters { limit },
            _ => BraintrustFilters::default(),
        };

        Ok(Self {
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            project_id: project_id.to_string(),
            experiment_id: experiment_id.to_string(),
            filters,
        })
    }
}
