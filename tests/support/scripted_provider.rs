//! Scripted in-process completion provider shared by integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use persona_relay::generation::GenerationClient;
use persona_relay::providers::{CompletionProvider, ProviderError, TokenStream};

/// Replays a fixed token script and canned one-shot responses.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    tokens: Vec<String>,
    fail_after_tokens: Option<String>,
    fail_at: Option<(usize, String)>,
    open_error: Option<String>,
    token_delay: Option<Duration>,
    completion: Option<String>,
    structured: Option<Value>,
    structured_delay: Option<Duration>,
    stream_calls: Arc<AtomicUsize>,
    structured_calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (*t).to_owned()).collect(),
            completion: Some(tokens.concat()),
            ..Self::default()
        }
    }

    /// Yield an error item after the scripted tokens.
    pub fn failing_after_tokens(mut self, message: &str) -> Self {
        self.fail_after_tokens = Some(message.to_owned());
        self
    }

    /// Yield an error item at `index`, with the remaining tokens still
    /// queued behind it.
    pub fn failing_at(mut self, index: usize, message: &str) -> Self {
        self.fail_at = Some((index, message.to_owned()));
        self
    }

    /// Refuse to open the stream at all; one-shot calls fail too.
    pub fn failing_to_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_owned());
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured = Some(value);
        self
    }

    pub fn with_structured_delay(mut self, delay: Duration) -> Self {
        self.structured_delay = Some(delay);
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    pub fn into_client(self) -> GenerationClient {
        GenerationClient::new(Arc::new(self))
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream(&self, _prompt: &str) -> Result<TokenStream, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_error {
            return Err(ProviderError::Unavailable(message.clone()));
        }

        let mut items: Vec<Result<String, ProviderError>> =
            self.tokens.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.fail_after_tokens {
            items.push(Err(ProviderError::Stream(message.clone())));
        }
        if let Some((index, message)) = &self.fail_at {
            let index = (*index).min(items.len());
            items.insert(index, Err(ProviderError::Stream(message.clone())));
        }

        let delay = self.token_delay;
        let stream = futures::stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        if let Some(message) = &self.open_error {
            return Err(ProviderError::Unavailable(message.clone()));
        }
        self.completion
            .clone()
            .ok_or_else(|| ProviderError::Parse("no scripted completion".to_owned()))
    }

    async fn complete_json(
        &self,
        _prompt: &str,
        _schema_name: &str,
        _schema: &Value,
    ) -> Result<Value, ProviderError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.structured_delay {
            tokio::time::sleep(delay).await;
        }
        self.structured
            .clone()
            .ok_or_else(|| ProviderError::Timeout)
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }
}

/// A structured analysis payload that passes validation.
pub fn valid_analysis() -> Value {
    let methods: Vec<Value> = ["Flashcards", "Mind maps", "Past papers", "Study group", "Videos", "Teach back"]
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "rationale": format!("{name} suits a daily studier."),
                "example": format!("Use {name} for Biology."),
                "icon": "📘",
            })
        })
        .collect();
    json!({
        "reasoning": "Enjoys science, studies daily.",
        "persona": "Aisyah is a curious Form 4 learner.",
        "language_preference": "English",
        "learning_methods": methods,
    })
}
