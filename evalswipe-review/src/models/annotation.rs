//! Annotation request sent to the backend for every decision

use serde::{Deserialize, Serialize};

use super::Verdict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub trace_id: String,
    pub pass_fail: Verdict,
    pub open_code: Option<String>,
    pub axial_tags: Vec<String>,
    pub reviewer_id: Option<String>,
}

impl Annotation {
    /// Pass or defer: no open code, no tags
    pub fn simple(trace_id: &str, verdict: Verdict, reviewer_id: &str) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            pass_fail: verdict,
            open_code: None,
            axial_tags: Vec::new(),
            reviewer_id: Some(reviewer_id.to_string()),
        }
    }

    pub fn fail(
        trace_id: &str,
        open_code: String,
        axial_tags: Vec<String>,
        reviewer_id: &str,
    ) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            pass_fail: Verdict::Fail,
            open_code: Some(open_code),
            axial_tags,
            reviewer_id: Some(reviewer_id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_annotation_wire_shape() {
        let annotation = Annotation::simple("trace_001", Verdict::Pass, "current_user");
        let value = serde_json::to_value(&annotation).unwrap();
        assert_eq!(value["pass_fail"], "pass");
        assert!(value["open_code"].is_null());
        assert_eq!(value["axial_tags"].as_array().unwrap().len(), 0);
    }
}
