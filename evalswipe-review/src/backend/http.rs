//! REST client for the EvalSwipe backend
//!
//! Endpoints live under a base URL such as `http://127.0.0.1:8000/api`.
//! Error bodies carry a `detail` field which is surfaced verbatim.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    BackendError, BackendSession, BraintrustImportRequest, CreateSessionRequest, ReviewBackend,
    TagMerge,
};
use crate::models::{Annotation, AxialTag, NewTag, Trace};

const USER_AGENT: &str = concat!("evalswipe/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct SessionEnvelope {
    session: BackendSession,
}

#[derive(Deserialize)]
struct TagEnvelope {
    tag: AxialTag,
}

#[derive(Deserialize)]
struct TagsEnvelope {
    #[serde(default)]
    tags: Vec<AxialTag>,
}

#[derive(Deserialize)]
struct DeleteTagResponse {
    #[serde(default)]
    traces_affected: usize,
}

#[derive(Deserialize)]
struct ImportResponse {
    #[serde(default)]
    traces: Vec<Trace>,
    #[serde(default)]
    imported_count: Option<usize>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Backend client over HTTP/JSON
pub struct HttpBackend {
    http_client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and decode a JSON body
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, BackendError> {
        debug!(endpoint = endpoint, "Backend request");

        let response = request.send().await.map_err(|e| {
            warn!(endpoint = endpoint, error = %e, "Backend unreachable");
            BackendError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(endpoint = endpoint, status = status.as_u16(), detail = %detail, "Backend request failed");
            return Err(BackendError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

/// Pull the `detail` message out of an error body
///
/// FastAPI validation errors put a list in `detail`; it is rendered as JSON.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(message) => Some(message),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ReviewBackend for HttpBackend {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<BackendSession, BackendError> {
        let endpoint = "/sessions/";
        let envelope: SessionEnvelope = self
            .send(self.http_client.post(self.url(endpoint)).json(request), endpoint)
            .await?;
        Ok(envelope.session)
    }

    async fn create_annotation(&self, annotation: &Annotation) -> Result<(), BackendError> {
        let endpoint = "/annotations/";
        let _: serde_json::Value = self
            .send(
                self.http_client.post(self.url(endpoint)).json(annotation),
                endpoint,
            )
            .await?;
        Ok(())
    }

    async fn get_tags(&self) -> Result<Vec<AxialTag>, BackendError> {
        let endpoint = "/tags/";
        let envelope: TagsEnvelope = self
            .send(self.http_client.get(self.url(endpoint)), endpoint)
            .await?;
        Ok(envelope.tags)
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<AxialTag, BackendError> {
        let endpoint = "/tags/";
        let envelope: TagEnvelope = self
            .send(self.http_client.post(self.url(endpoint)).json(tag), endpoint)
            .await?;
        Ok(envelope.tag)
    }

    async fn update_tag(&self, tag_id: &str, tag: &NewTag) -> Result<AxialTag, BackendError> {
        let endpoint = format!("/tags/{}", tag_id);
        let envelope: TagEnvelope = self
            .send(self.http_client.put(self.url(&endpoint)).json(tag), &endpoint)
            .await?;
        Ok(envelope.tag)
    }

    async fn delete_tag(&self, tag_id: &str, untag_traces: bool) -> Result<usize, BackendError> {
        let endpoint = format!("/tags/{}", tag_id);
        let response: DeleteTagResponse = self
            .send(
                self.http_client
                    .delete(self.url(&endpoint))
                    .query(&[("untag_traces", untag_traces)]),
                &endpoint,
            )
            .await?;
        Ok(response.traces_affected)
    }

    async fn merge_tags(
        &self,
        source_tag_id: &str,
        target_tag_id: &str,
    ) -> Result<TagMerge, BackendError> {
        let endpoint = "/tags/merge";
        let body = json!({
            "source_tag_id": source_tag_id,
            "target_tag_id": target_tag_id,
        });
        self.send(self.http_client.post(self.url(endpoint)).json(&body), endpoint)
            .await
    }

    async fn import_braintrust(
        &self,
        request: &BraintrustImportRequest,
    ) -> Result<Vec<Trace>, BackendError> {
        let endpoint = "/braintrust/import";
        let response: ImportResponse = self
            .send(self.http_client.post(self.url(endpoint)).json(request), endpoint)
            .await?;

        debug!(
            imported = response.imported_count.unwrap_or(response.traces.len()),
            "Braintrust import returned traces"
        );
        Ok(response.traces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_string() {
        assert_eq!(
            error_detail(r#"{"detail":"Trace t9 not found"}"#).as_deref(),
            Some("Trace t9 not found")
        );
    }

    #[test]
    fn test_error_detail_structured() {
        let detail = error_detail(r#"{"detail":[{"loc":["body","name"]}]}"#).unwrap();
        assert!(detail.contains("loc"));
    }

    #[test]
    fn test_error_detail_missing() {
        assert!(error_detail("<html>Bad gateway</html>").is_none());
        assert!(error_detail(r#"{"message":"nope"}"#).is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/api/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000/api");
        assert_eq!(backend.url("/tags/"), "http://localhost:8000/api/tags/");
    }
}
