//! Generation client: one outbound completion call, in one of two modes.
//!
//! - **Streaming** ([`GenerationClient::start_streaming`]): runs in a
//!   background task and reports progress through an [`EventSink`] as
//!   `Started`, `Token*`, then exactly one of `Completed` / `Failed`.
//! - **Structured** ([`GenerationClient::generate_structured`]): a single
//!   round trip returning a complete [`StructuredAnalysis`] or an error.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{output_schema, SchemaError, StructuredAnalysis, SCHEMA_NAME};
use crate::providers::{CompletionProvider, ProviderError};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One unit of progress from an in-flight streaming generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// The remote call has begun.
    Started,
    /// A text fragment arrived.
    Token {
        /// The fragment, verbatim.
        text: String,
        /// Whitespace-delimited words in the whole generation so far.
        word_count: usize,
    },
    /// The provider signalled end-of-stream.
    Completed {
        /// Seconds since `Started`.
        elapsed_seconds: f64,
    },
    /// The generation failed; nothing follows.
    Failed {
        /// Human-readable cause.
        message: String,
    },
}

impl GenerationEvent {
    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// The receiving side of a sink has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Callback interface the streaming task reports through.
pub trait EventSink: Send + 'static {
    /// Deliver one event. Must not block.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] when nobody is listening any more; the
    /// generation task stops on the first such error.
    fn emit(&self, event: GenerationEvent) -> Result<(), SinkClosed>;
}

impl EventSink for mpsc::UnboundedSender<GenerationEvent> {
    fn emit(&self, event: GenerationEvent) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the non-streaming modes.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The provider call failed or timed out.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The structured result did not validate.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ---------------------------------------------------------------------------
// Word counting
// ---------------------------------------------------------------------------

/// Accumulates streamed text and reports the cumulative word count.
///
/// The count is taken over the whole buffer, so a word split across two
/// fragments counts once.
#[derive(Debug, Default, Clone)]
pub struct WordCounter {
    text: String,
}

impl WordCounter {
    /// Append a fragment and return the running word count.
    pub fn push(&mut self, fragment: &str) -> usize {
        self.text.push_str(fragment);
        self.count()
    }

    /// Words seen so far.
    pub fn count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// All text seen so far.
    pub fn text(&self) -> &str {
        &self.text
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Wraps a shared provider handle with the two generation modes.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn CompletionProvider>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("model", &self.provider.model_id())
            .finish()
    }
}

impl GenerationClient {
    /// Create a client over an already-configured provider.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Model identifier of the underlying provider.
    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Spawn a streaming generation reporting into `sink`.
    ///
    /// The task emits `Started` first and exactly one terminal event last,
    /// unless the sink closes early, in which case it stops silently.
    pub fn start_streaming<S: EventSink>(&self, prompt: String, sink: S) -> JoinHandle<()> {
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move { stream_into(provider, prompt, sink).await })
    }

    /// Full completion text in one round trip.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Provider`] on any provider failure.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        let text = self.provider.complete(prompt).await?;
        info!(
            model = %self.provider.model_id(),
            elapsed_ms = started.elapsed().as_millis(),
            "completion finished"
        );
        Ok(text)
    }

    /// Schema-constrained analysis in one round trip. Never partial.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Provider`] on provider failure or timeout,
    /// [`GenerationError::Schema`] when the result fails validation.
    pub async fn generate_structured(
        &self,
        prompt: &str,
    ) -> Result<StructuredAnalysis, GenerationError> {
        let started = Instant::now();
        let value = self
            .provider
            .complete_json(prompt, SCHEMA_NAME, &output_schema())
            .await?;
        let analysis = StructuredAnalysis::parse(value)?;
        info!(
            model = %self.provider.model_id(),
            elapsed_ms = started.elapsed().as_millis(),
            "structured completion finished"
        );
        Ok(analysis)
    }
}

async fn stream_into<S: EventSink>(provider: Arc<dyn CompletionProvider>, prompt: String, sink: S) {
    let started = Instant::now();
    if sink.emit(GenerationEvent::Started).is_err() {
        debug!("sink closed before generation started");
        return;
    }

    let mut tokens = match provider.stream(&prompt).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "failed to open completion stream");
            let _ = sink.emit(GenerationEvent::Failed {
                message: e.to_string(),
            });
            return;
        }
    };

    let mut counter = WordCounter::default();
    while let Some(item) = tokens.next().await {
        match item {
            Ok(text) => {
                let word_count = counter.push(&text);
                if sink
                    .emit(GenerationEvent::Token { text, word_count })
                    .is_err()
                {
                    debug!(word_count, "sink closed mid-generation, stopping");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, words = counter.count(), "completion stream failed");
                let _ = sink.emit(GenerationEvent::Failed {
                    message: e.to_string(),
                });
                return;
            }
        }
    }

    let elapsed_seconds = started.elapsed().as_secs_f64();
    debug!(words = counter.count(), elapsed_seconds, "completion stream finished");
    let _ = sink.emit(GenerationEvent::Completed { elapsed_seconds });
}
