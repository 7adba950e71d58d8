//! Session metadata and configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Where the session's traces came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceSource {
    Demo,
    #[default]
    Upload,
    Braintrust,
}

/// Which coding passes the reviewer intends to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    OpenCoding,
    AxialCoding,
    #[default]
    Combined,
}

/// Explicit session configuration handed to `create_session`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub source: TraceSource,
    #[serde(default)]
    pub mode: ReviewMode,
    /// Asks the backend to shuffle trace order at creation time
    #[serde(default, alias = "randomize_traces")]
    pub randomize_order: bool,
}

impl SessionConfig {
    pub fn for_source(source: TraceSource) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }
}

/// Session identity as assigned by the backend
///
/// The backend also returns derived counters; they are ignored here because
/// progress is always recomputed from the traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mode: ReviewMode,
    #[serde(default)]
    pub source: TraceSource,
    #[serde(default)]
    pub randomize_order: bool,
}

impl SessionInfo {
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            source: self.source,
            mode: self.mode,
            randomize_order: self.randomize_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_session_payload_parses() {
        let info: SessionInfo = serde_json::from_value(json!({
            "id": "session_ab12cd34",
            "name": "Demo Session",
            "created_at": "2024-03-01T12:00:00.5",
            "mode": "combined",
            "source": "demo",
            "total_traces": 3,
            "reviewed_count": 0
        }))
        .unwrap();

        assert_eq!(info.id, "session_ab12cd34");
        assert_eq!(info.source, TraceSource::Demo);
        assert_eq!(info.config().mode, ReviewMode::Combined);
    }

    #[test]
    fn test_config_serializes_snake_case() {
        let config = SessionConfig {
            source: TraceSource::Braintrust,
            mode: ReviewMode::OpenCoding,
            randomize_order: true,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["source"], "braintrust");
        assert_eq!(value["mode"], "open_coding");
        assert_eq!(value["randomize_order"], true);
    }
}
