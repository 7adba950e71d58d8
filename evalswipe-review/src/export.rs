//! Session export document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AxialTag, SessionInfo, Trace};
use crate::session::ReviewSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session: SessionInfo,
    pub traces: Vec<Trace>,
    pub tags: Vec<AxialTag>,
    pub exported_at: DateTime<Utc>,
}

impl SessionExport {
    pub fn from_session(session: &ReviewSession, exported_at: DateTime<Utc>) -> Self {
        Self {
            session: session.info().clone(),
            traces: session.traces().as_slice().to_vec(),
            tags: session.tags().all().to_vec(),
            exported_at,
        }
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// `evalswipe_session_<epoch millis>.json`
    pub fn file_name(&self) -> String {
        format!(
            "evalswipe_session_{}.json",
            evalswipe_common::time::file_stamp(self.exported_at)
        )
    }
}
