//! Axial tag model: a reusable, named failure category

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;
use crate::error::ReviewError;

pub const TAG_NAME_MIN_CHARS: usize = 2;
pub const TAG_NAME_MAX_CHARS: usize = 30;
pub const TAG_DESCRIPTION_MIN_CHARS: usize = 20;
pub const TAG_DESCRIPTION_MAX_CHARS: usize = 200;
pub const DEFAULT_TAG_COLOR: &str = "#808080";

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

/// Tag as stored by the backend
///
/// `usage_count` is maintained server-side and read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxialTag {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Tag creation/update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
}

impl NewTag {
    /// Build a request with trimmed name and description
    ///
    /// An empty color falls back to the default grey.
    pub fn new(name: &str, description: &str, color: &str) -> Self {
        let color = color.trim();
        Self {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            color: if color.is_empty() {
                default_color()
            } else {
                color.to_string()
            },
        }
    }

    /// Check the length rules before anything is sent to the backend
    pub fn validate(&self) -> Result<(), ReviewError> {
        let name_len = self.name.chars().count();
        if name_len < TAG_NAME_MIN_CHARS {
            return Err(ReviewError::Validation(format!(
                "Tag name must be at least {} characters",
                TAG_NAME_MIN_CHARS
            )));
        }
        if name_len > TAG_NAME_MAX_CHARS {
            return Err(ReviewError::Validation(format!(
                "Tag name must be at most {} characters",
                TAG_NAME_MAX_CHARS
            )));
        }

        let description_len = self.description.chars().count();
        if description_len < TAG_DESCRIPTION_MIN_CHARS {
            return Err(ReviewError::Validation(format!(
                "Tag description must be at least {} characters",
                TAG_DESCRIPTION_MIN_CHARS
            )));
        }
        if description_len > TAG_DESCRIPTION_MAX_CHARS {
            return Err(ReviewError::Validation(format!(
                "Tag description must be at most {} characters",
                TAG_DESCRIPTION_MAX_CHARS
            )));
        }
        Ok(())
    }
}
