//! OpenAI provider implementation using the `/chat/completions` API.
//!
//! Streaming responses are read as server-sent events; each `data:` payload
//! is a chunk whose `choices[0].delta.content` carries the next fragment.
//! The literal payload `[DONE]` ends the stream.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;

use super::{
    check_http_response, ensure_success, CompletionProvider, ProviderError, TokenStream,
};

const STREAM_DONE_SENTINEL: &str = "[DONE]";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages (a single user message here).
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream the response as SSE.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    /// Structured-output constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

/// A message in OpenAI chat format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    /// Role (`user`).
    pub role: String,
    /// Text content.
    pub content: String,
}

/// Non-streaming response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    /// Response choices.
    pub choices: Vec<OpenAiChoice>,
}

/// A response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    /// Assistant message for this choice.
    pub message: OpenAiResponseMessage,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Assistant message.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    /// Text content.
    pub content: Option<String>,
    /// Refusal text, set when the model declines a structured request.
    #[serde(default)]
    pub refusal: Option<String>,
}

/// One streamed chunk.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Chunk choices; may be empty on usage-only chunks.
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
}

/// A streamed choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental delta.
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Set on the final chunk for this choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta content.
#[doc(hidden)]
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Next text fragment.
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI chat completions provider.
///
/// Built once at startup from [`LlmConfig`]; the inner `reqwest::Client`
/// pools connections across requests.
#[derive(Clone)]
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] when no API key is configured,
    /// or [`ProviderError::Request`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Unavailable("OPENAI_API_KEY is not set".to_owned()))?;
        Self::new(
            &config.base_url,
            config.model.clone(),
            api_key,
            config.temperature,
            config.request_timeout(),
        )
    }

    /// Create a provider against an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Request`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: String,
        api_key: String,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
            temperature,
            client,
        })
    }

    async fn post(&self, body: &OpenAiRequest) -> Result<reqwest::Response, ProviderError> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from_transport)
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a chat completions request for a single prompt.
#[doc(hidden)]
pub fn build_request(
    model: &str,
    temperature: f32,
    prompt: &str,
    stream: bool,
    response_format: Option<Value>,
) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_owned(),
        messages: vec![OpenAiMessage {
            role: "user".to_owned(),
            content: prompt.to_owned(),
        }],
        temperature,
        stream,
        response_format,
    }
}

/// `response_format` payload for strict JSON-schema output.
#[doc(hidden)]
pub fn json_schema_format(schema_name: &str, schema: &Value) -> Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema_name,
            "strict": true,
            "schema": schema,
        }
    })
}

/// Extract the first choice's text from a non-streaming response.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body is malformed, has no choices,
/// carries a refusal, or has no content.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, ProviderError> {
    let resp: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("missing choices[0]".to_owned()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(ProviderError::Parse(format!("model refused: {refusal}")));
    }
    if choice.finish_reason.as_deref() == Some("length") {
        return Err(ProviderError::Parse(
            "completion truncated at max tokens".to_owned(),
        ));
    }

    choice
        .message
        .content
        .ok_or_else(|| ProviderError::Parse("missing choices[0].message.content".to_owned()))
}

/// Decode one SSE `data:` payload.
///
/// Returns `Ok(None)` for the `[DONE]` sentinel and `Ok(Some(""))` for
/// chunks that carry no text (role headers, usage chunks).
///
/// # Errors
///
/// Returns `ProviderError::Parse` when the payload is not a chunk object,
/// or when the model stopped at the token limit.
#[doc(hidden)]
pub fn parse_stream_data(data: &str) -> Result<Option<String>, ProviderError> {
    let data = data.trim();
    if data == STREAM_DONE_SENTINEL {
        return Ok(None);
    }
    let chunk: OpenAiStreamChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::Parse(e.to_string()))?;
    if chunk
        .choices
        .iter()
        .any(|c| c.finish_reason.as_deref() == Some("length"))
    {
        return Err(ProviderError::Parse(
            "completion truncated at max tokens".to_owned(),
        ));
    }
    let text = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect::<String>();
    Ok(Some(text))
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn stream(&self, prompt: &str) -> Result<TokenStream, ProviderError> {
        let body = build_request(&self.model, self.temperature, prompt, true, None);
        let response = ensure_success(self.post(&body).await?).await?;

        let events = response.bytes_stream().eventsource();
        let tokens = events
            .map(|event| match event {
                Ok(event) => parse_stream_data(&event.data),
                Err(e) => Err(ProviderError::Stream(e.to_string())),
            })
            // `[DONE]` ends the stream; errors are yielded once, then the stream ends.
            .scan(false, |failed, item| {
                if *failed {
                    return futures::future::ready(None);
                }
                let next = match item {
                    Ok(None) => None,
                    Ok(Some(text)) => Some(Ok(text)),
                    Err(e) => {
                        *failed = true;
                        Some(Err(e))
                    }
                };
                futures::future::ready(next)
            })
            .filter(|item| futures::future::ready(!matches!(item, Ok(text) if text.is_empty())));

        Ok(Box::pin(tokens))
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = build_request(&self.model, self.temperature, prompt, false, None);
        let payload = check_http_response(self.post(&body).await?).await?;
        parse_response(&payload)
    }

    async fn complete_json(
        &self,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, ProviderError> {
        let format = json_schema_format(schema_name, schema);
        let body = build_request(&self.model, self.temperature, prompt, false, Some(format));
        let payload = check_http_response(self.post(&body).await?).await?;
        let text = parse_response(&payload)?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("structured output is not JSON: {e}")))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
