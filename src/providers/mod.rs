//! Completion provider abstraction layer.
//!
//! Defines the [`CompletionProvider`] trait and the shared error type used
//! by provider implementations. One provider is implemented:
//! - [`openai::OpenAiProvider`]: OpenAI-compatible `/chat/completions` API
//!
//! Providers treat the prompt as opaque text; they never inspect it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use regex::Regex;
use serde_json::Value;

pub mod openai;

/// Incremental text fragments from a streaming completion.
///
/// The stream ends when the provider signals end-of-stream. An `Err` item
/// is final; callers must not poll further after one.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by completion providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The request did not finish within the configured timeout.
    #[error("provider request timed out")]
    Timeout,
    /// Response did not match expected schema.
    #[error("provider response parse error: {0}")]
    Parse(String),
    /// The event stream broke mid-generation.
    #[error("provider stream error: {0}")]
    Stream(String),
    /// Upstream provider responded with an error status.
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Provider cannot satisfy the request with current configuration.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Classify a transport error, separating timeouts.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ProviderError::Request` on transport failure, `ProviderError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(ProviderError::from_transport)?;
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Fail fast on a non-2xx response without consuming a success body.
///
/// Streaming callers need the body left untouched on success.
///
/// # Errors
///
/// Returns `ProviderError::HttpStatus` with the sanitized body on non-2xx.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.map_err(ProviderError::from_transport)?;
    Err(ProviderError::HttpStatus {
        status: status.as_u16(),
        body: sanitize_http_error_body(&body),
    })
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-proj-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9]{32,}",
        r"sk-lf-[A-Za-z0-9\-]{8,}",
        r"pk-lf-[A-Za-z0-9\-]{8,}",
        r"Bearer [A-Za-z0-9_\-\.]{16,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core completion provider interface.
///
/// Implementations hold only read-only state (credentials, a pooled HTTP
/// client) and are shared process-wide behind an `Arc`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a streaming completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the stream cannot be opened. Failures
    /// after the stream opens arrive as `Err` items on the stream.
    async fn stream(&self, prompt: &str) -> Result<TokenStream, ProviderError>;

    /// Request the full completion text in one round trip.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on API, network, or parse failure.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Request a completion constrained to `schema` and return the parsed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on API, network, or parse failure.
    async fn complete_json(
        &self,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, ProviderError>;

    /// The model identifier this provider is instantiated for.
    fn model_id(&self) -> &str;
}
