//! Fire-and-forget generation tracing to a Langfuse-compatible ingestion API.
//!
//! Disabled unless both keys are configured. Recording never blocks the
//! request path and never fails it: the upload runs in a detached task and
//! its errors are logged and dropped.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::prompt::PersonaDomain;

const INGESTION_PATH: &str = "/api/public/ingestion";

/// Telemetry upload failures. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Transport failure.
    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Ingestion endpoint rejected the batch.
    #[error("telemetry endpoint returned status {0}")]
    Status(u16),
}

/// One finished generation, as reported to the tracing backend.
#[derive(Debug, Clone)]
pub struct GenerationTrace {
    /// Fresh v4 trace id.
    pub trace_id: Uuid,
    /// `persona-customer` / `persona-student`.
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Prompt sent to the model.
    pub input: String,
    /// Generated text; empty when the call failed early.
    pub output: String,
    /// Request start.
    pub start_time: DateTime<Utc>,
    /// Request end.
    pub end_time: DateTime<Utc>,
    /// Failure message, if the generation failed.
    pub error: Option<String>,
}

impl GenerationTrace {
    /// Start a trace for `domain` at the current instant.
    pub fn begin(domain: PersonaDomain, model: &str, input: &str) -> Self {
        let now = Utc::now();
        Self {
            trace_id: Uuid::new_v4(),
            name: format!("persona-{}", domain.path_segment()),
            model: model.to_owned(),
            input: input.to_owned(),
            output: String::new(),
            start_time: now,
            end_time: now,
            error: None,
        }
    }

    /// Close the trace with the generated text.
    #[must_use]
    pub fn finish(mut self, output: &str) -> Self {
        self.output = output.to_owned();
        self.end_time = Utc::now();
        self
    }

    /// Close the trace as failed.
    #[must_use]
    pub fn fail(mut self, output: &str, message: &str) -> Self {
        self.error = Some(message.to_owned());
        self.finish(output)
    }

    /// Ingestion batch: one trace plus one generation observation.
    pub fn to_batch(&self) -> Value {
        let timestamp = self.end_time.to_rfc3339();
        let level = if self.error.is_some() { "ERROR" } else { "DEFAULT" };
        json!({
            "batch": [
                {
                    "id": Uuid::new_v4().to_string(),
                    "timestamp": timestamp,
                    "type": "trace-create",
                    "body": {
                        "id": self.trace_id.to_string(),
                        "name": self.name,
                        "input": self.input,
                        "output": self.output,
                        "timestamp": self.start_time.to_rfc3339(),
                    }
                },
                {
                    "id": Uuid::new_v4().to_string(),
                    "timestamp": timestamp,
                    "type": "generation-create",
                    "body": {
                        "id": Uuid::new_v4().to_string(),
                        "traceId": self.trace_id.to_string(),
                        "name": self.name,
                        "model": self.model,
                        "input": self.input,
                        "output": self.output,
                        "startTime": self.start_time.to_rfc3339(),
                        "endTime": timestamp,
                        "level": level,
                        "statusMessage": self.error,
                    }
                }
            ]
        })
    }
}

/// HTTP client for the ingestion endpoint.
#[derive(Clone)]
pub struct LangfuseClient {
    endpoint: String,
    public_key: String,
    secret_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LangfuseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl LangfuseClient {
    /// Build a client against `host`.
    pub fn new(host: &str, public_key: String, secret_key: String) -> Self {
        Self {
            endpoint: format!("{}{INGESTION_PATH}", host.trim_end_matches('/')),
            public_key,
            secret_key,
            client: reqwest::Client::new(),
        }
    }

    /// Upload one trace.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] on transport failure or a non-2xx status.
    pub async fn ingest(&self, trace: &GenerationTrace) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&trace.to_batch())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Process-wide telemetry handle. Cheap to clone; a no-op when disabled.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    client: Option<LangfuseClient>,
}

impl Telemetry {
    /// Build from configuration; disabled unless both keys are set.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        match (&config.public_key, &config.secret_key) {
            (Some(public), Some(secret)) if config.is_enabled() => Self {
                client: Some(LangfuseClient::new(
                    &config.host,
                    public.clone(),
                    secret.clone(),
                )),
            },
            _ => {
                info!("telemetry disabled, Langfuse keys not configured");
                Self::disabled()
            }
        }
    }

    /// A handle that records nothing.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Whether traces are uploaded.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Upload `trace` in the background. Returns immediately.
    pub fn record_generation(&self, trace: GenerationTrace) {
        let Some(client) = self.client.clone() else {
            return;
        };
        tokio::spawn(async move {
            match client.ingest(&trace).await {
                Ok(()) => debug!(trace_id = %trace.trace_id, "generation trace recorded"),
                Err(e) => warn!(trace_id = %trace.trace_id, error = %e, "failed to record generation trace"),
            }
        });
    }
}
