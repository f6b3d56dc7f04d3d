//! Transport adapter: relay frames → server-push wire frames.
//!
//! Two encodings:
//! - [`WireFormat::Json`]: one `data: <json>` record per frame, with
//!   `type` ∈ `stage | summary | token | error | done`.
//! - [`WireFormat::Html`]: named events whose data is an escaped HTML
//!   fragment for progressive-replacement clients.
//!
//! Pure formatting; ordering and termination are the relay's job.

use std::convert::Infallible;
use std::str::FromStr;

use axum::response::sse::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::relay::{RelayFrame, StreamStatus};

/// Wire encoding selected by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Tagged JSON records.
    #[default]
    Json,
    /// Named events carrying HTML fragments.
    Html,
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown wire format {other:?}")),
        }
    }
}

/// One encoded server-push record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Named event, if any.
    pub event: Option<String>,
    /// Payload; may span several lines.
    pub data: String,
}

impl WireFrame {
    /// Render as SSE text: optional `event:` line, one `data:` line per
    /// payload line, blank-line terminator.
    pub fn to_sse_text(&self) -> String {
        let mut text = String::new();
        if let Some(event) = &self.event {
            text.push_str("event: ");
            text.push_str(event);
            text.push('\n');
        }
        for line in self.data.split('\n') {
            text.push_str("data: ");
            text.push_str(line);
            text.push('\n');
        }
        text.push('\n');
        text
    }

    /// Convert into an axum SSE event.
    pub fn into_sse_event(self) -> Result<Event, Infallible> {
        let event = Event::default().data(self.data);
        Ok(match self.event {
            Some(name) => event.event(name),
            None => event,
        })
    }
}

/// Encode one relay frame.
pub fn encode(frame: &RelayFrame, format: WireFormat) -> WireFrame {
    match format {
        WireFormat::Json => WireFrame {
            event: None,
            data: json_record(frame).to_string(),
        },
        WireFormat::Html => html_fragment(frame),
    }
}

fn json_record(frame: &RelayFrame) -> Value {
    match frame {
        RelayFrame::Stage { stage } => json!({ "type": "stage", "stage": stage }),
        RelayFrame::AnalysisUnavailable { message } => json!({
            "type": "stage",
            "stage": "analysis_unavailable",
            "message": message,
        }),
        RelayFrame::Summary { text } => json!({
            "type": "summary",
            "kind": "profile",
            "text": text,
        }),
        RelayFrame::Analysis { analysis } => json!({
            "type": "summary",
            "kind": "analysis",
            "analysis": analysis,
        }),
        RelayFrame::Completed {
            elapsed_seconds,
            word_count,
            text,
        } => json!({
            "type": "summary",
            "kind": "persona",
            "text": text,
            "word_count": word_count,
            "elapsed_seconds": elapsed_seconds,
        }),
        RelayFrame::Token { text, word_count } => json!({
            "type": "token",
            "content": text,
            "word_count": word_count,
        }),
        RelayFrame::Failed { message } => json!({ "type": "error", "message": message }),
        RelayFrame::StreamEnd { timestamp, status } => json!({
            "type": "done",
            "status": status,
            "timestamp": timestamp.to_rfc3339(),
        }),
    }
}

fn html_fragment(frame: &RelayFrame) -> WireFrame {
    let (event, data) = match frame {
        RelayFrame::Stage { stage } => (
            "stage",
            format!(r#"<span class="stage">{}</span>"#, escape(stage)),
        ),
        RelayFrame::AnalysisUnavailable { message } => (
            "stage",
            format!(
                r#"<span class="stage stage-warning">Analysis unavailable: {}</span>"#,
                escape(message)
            ),
        ),
        RelayFrame::Summary { text } => (
            "summary",
            format!(r#"<p class="profile-summary">{}</p>"#, escape(text)),
        ),
        RelayFrame::Token { text, .. } => ("token", escape(text)),
        RelayFrame::Analysis { analysis } => {
            let items: String = analysis
                .learning_methods
                .iter()
                .map(|m| {
                    format!(
                        r#"<li class="learning-method"><span class="icon">{}</span> <strong>{}</strong>: {} <em>{}</em></li>"#,
                        escape(&m.icon),
                        escape(&m.name),
                        escape(&m.rationale),
                        escape(&m.example)
                    )
                })
                .collect();
            (
                "analysis",
                format!(
                    r#"<div class="analysis"><p class="language">Language preference: {}</p><ul>{items}</ul></div>"#,
                    escape(&analysis.language_preference)
                ),
            )
        }
        RelayFrame::Completed {
            elapsed_seconds,
            word_count,
            ..
        } => (
            "complete",
            format!(
                r#"<span class="stats">{word_count} words in {elapsed_seconds:.1}s</span>"#
            ),
        ),
        RelayFrame::Failed { message } => (
            "error",
            format!(r#"<div class="error">{}</div>"#, escape(message)),
        ),
        RelayFrame::StreamEnd { timestamp, status } => {
            let label = match status {
                StreamStatus::Completed => "Generated",
                StreamStatus::Failed => "Stopped",
            };
            (
                "done",
                format!(
                    r#"<span class="timestamp">{label} {}</span>"#,
                    timestamp.format("%B %d, %Y at %I:%M %p")
                ),
            )
        }
    };
    WireFrame {
        event: Some(event.to_owned()),
        data,
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}
