//! Typed failures for the grading pipeline.
//!
//! Every stage returns [`PipelineResult`]; callers branch on [`ErrorKind`] instead of
//! sniffing error messages. The retry loop is the only consumer that treats a kind
//! as recoverable.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Backend reported "too many requests". Transient.
    RateLimited,
    /// Retries were exhausted while the backend kept rate limiting.
    RateLimitExhausted,
    /// Backend rejected the credential.
    InvalidCredential,
    /// No structured payload could be extracted from model output.
    MalformedOutput,
    /// Neither essay was submitted.
    NoContentSubmitted,
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::RateLimitExhausted => "rate_limit_exhausted",
            Self::InvalidCredential => "invalid_credential",
            Self::MalformedOutput => "malformed_output",
            Self::NoContentSubmitted => "no_content_submitted",
            Self::Unclassified => "unclassified",
        }
    }

    /// Only rate limiting is worth waiting out.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub provider: Option<String>,
    pub detail: Option<String>,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            provider: None,
            detail: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn rate_limited(status: u16, provider: &str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, "backend is rate limiting requests")
            .with_status(status)
            .with_provider(provider)
            .with_detail(detail)
    }

    pub fn rate_limit_exhausted(attempts: u32, last: &PipelineError) -> Self {
        let mut err = Self::new(
            ErrorKind::RateLimitExhausted,
            format!("still rate limited after {} attempts", attempts),
        );
        err.status = last.status;
        err.provider = last.provider.clone();
        err.detail = last.detail.clone();
        err
    }

    pub fn invalid_credential(status: u16, provider: &str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredential, "backend rejected the API key")
            .with_status(status)
            .with_provider(provider)
            .with_detail(detail)
    }

    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, message)
    }

    pub fn no_content_submitted() -> Self {
        Self::new(
            ErrorKind::NoContentSubmitted,
            "no essay was submitted for either task",
        )
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Text suitable for showing to the person who submitted the essays.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::RateLimited | ErrorKind::RateLimitExhausted => {
                "The grading service is busy right now. Please try again shortly; your essays have been kept."
            }
            ErrorKind::InvalidCredential => {
                "The grading service rejected your API key. Please sign in again or update the key; your essays have been kept."
            }
            ErrorKind::MalformedOutput => {
                "The grader returned a response we could not read. Please try again; your essays have been kept."
            }
            ErrorKind::NoContentSubmitted => {
                "Write at least one of the two tasks before requesting an evaluation."
            }
            ErrorKind::Unclassified => {
                "Something went wrong while grading. Please try again; your essays have been kept."
            }
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let mut out = Self::unclassified(format!("request failed: {}", err));
        if let Some(status) = err.status() {
            out = out.with_status(status.as_u16());
        }
        out
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_output(format!("invalid JSON payload: {}", err))
    }
}
