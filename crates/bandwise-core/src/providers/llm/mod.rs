//! Grading backends.
//!
//! A [`ModelCaller`] sends one prompt and returns the raw text. It never retries;
//! failures come back classified so the retry loop can decide.

pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Credentials, EvaluatorConfig, Provider};
use crate::errors::{PipelineError, PipelineResult};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// One call to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// JSON Schema the answer must follow, when the backend supports constrained output.
    pub schema: Option<serde_json::Value>,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> PipelineResult<String>;

    fn provider_name(&self) -> &'static str;
}

/// Sampling and transport settings shared by the HTTP backends.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn from_config(cfg: &EvaluatorConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            base_url: cfg.base_url().trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

/// Backend selected by `cfg.provider`, authenticated with `credentials`.
pub fn build_client(
    cfg: &EvaluatorConfig,
    credentials: Credentials,
) -> PipelineResult<Arc<dyn ModelCaller>> {
    let settings = ClientSettings::from_config(cfg);
    Ok(match cfg.provider {
        Provider::Gemini => Arc::new(GeminiClient::new(settings, credentials)?),
        Provider::Openai => Arc::new(OpenAiClient::new(settings, credentials)?),
    })
}

pub(crate) fn http_client(timeout: Duration) -> PipelineResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::unclassified(format!("failed to build HTTP client: {}", e)))
}

const RATE_LIMIT_MARKERS: &[&str] = &["RESOURCE_EXHAUSTED", "rate_limit_exceeded"];
const CREDENTIAL_MARKERS: &[&str] = &["API_KEY_INVALID", "PERMISSION_DENIED", "invalid_api_key"];

/// Map a non-success response to a pipeline error.
///
/// This is the only place backend status codes are interpreted.
pub(crate) fn classify_failure(provider: &str, status: u16, body: &str) -> PipelineError {
    let detail: String = body.chars().take(500).collect();

    if status == 429 || RATE_LIMIT_MARKERS.iter().any(|m| body.contains(m)) {
        return PipelineError::rate_limited(status, provider, detail);
    }
    if status == 401 || status == 403 || CREDENTIAL_MARKERS.iter().any(|m| body.contains(m)) {
        return PipelineError::invalid_credential(status, provider, detail);
    }
    PipelineError::unclassified(format!("{} API error (status {})", provider, status))
        .with_status(status)
        .with_provider(provider)
        .with_detail(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn classify_by_status() {
        assert_eq!(classify_failure("gemini", 429, "").kind, ErrorKind::RateLimited);
        assert_eq!(
            classify_failure("openai", 401, "").kind,
            ErrorKind::InvalidCredential
        );
        assert_eq!(
            classify_failure("openai", 403, "").kind,
            ErrorKind::InvalidCredential
        );
        assert_eq!(classify_failure("gemini", 500, "").kind, ErrorKind::Unclassified);
    }

    #[test]
    fn classify_by_body_marker() {
        let quota = r#"{"error": {"code": 400, "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify_failure("gemini", 400, quota).kind, ErrorKind::RateLimited);

        let key = r#"{"error": {"details": [{"reason": "API_KEY_INVALID"}]}}"#;
        let err = classify_failure("gemini", 400, key);
        assert_eq!(err.kind, ErrorKind::InvalidCredential);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.provider.as_deref(), Some("gemini"));
    }

    #[test]
    fn build_client_selects_backend() {
        let mut cfg = EvaluatorConfig::default();
        let client = build_client(&cfg, Credentials::new("k")).unwrap();
        assert_eq!(client.provider_name(), "gemini");

        cfg.provider = Provider::Openai;
        let client = build_client(&cfg, Credentials::new("k")).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }
}
