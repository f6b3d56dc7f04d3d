//! Route handlers.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::error::AppError;
use crate::profile::{self, BodyEncoding, Profile};
use crate::prompt::{build_prompt, build_structured_prompt, PersonaDomain};
use crate::relay::{AnalysisFuture, Relay, RelayFrame, RelayOutcome};
use crate::summary::summarize;
use crate::telemetry::GenerationTrace;
use crate::transport::{encode, WireFormat};

use super::{AppState, FRAME_BUFFER};

/// `?format=` on streaming routes.
#[derive(Debug, Default, Deserialize)]
pub(super) struct StreamQuery {
    #[serde(default)]
    format: WireFormat,
}

fn decode_profile(
    domain: PersonaDomain,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Profile, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let profile = profile::decode(domain, BodyEncoding::from_content_type(content_type), body)?;
    debug!(domain = %domain, name = profile.name(), "profile accepted");
    Ok(profile)
}

// ── Health ───────────────────────────────────────────────────

pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.client.model_id(),
        "telemetry": state.telemetry.is_enabled(),
    }))
}

// ── One-shot persona ─────────────────────────────────────────

pub(super) async fn customer_persona(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let profile = decode_profile(PersonaDomain::InsuranceAdvisor, &headers, &body)?;
    persona(state, profile).await
}

pub(super) async fn student_persona(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let profile = decode_profile(PersonaDomain::Tutor, &headers, &body)?;
    persona(state, profile).await
}

async fn persona(state: AppState, profile: Profile) -> Result<Json<Value>, AppError> {
    let domain = profile.domain();
    let summary = summarize(&profile);
    let prompt = build_prompt(&summary, domain);

    let trace = GenerationTrace::begin(domain, state.client.model_id(), &prompt);
    let persona = match state.client.generate(&prompt).await {
        Ok(text) => {
            state.telemetry.record_generation(trace.finish(&text));
            text
        }
        Err(e) => {
            state
                .telemetry
                .record_generation(trace.fail("", &e.to_string()));
            return Err(e.into());
        }
    };

    Ok(Json(json!({
        "profile_text": summary,
        "persona_prompt": prompt,
        "persona_result": persona,
    })))
}

// ── Streaming persona ────────────────────────────────────────

pub(super) async fn customer_persona_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let profile = decode_profile(PersonaDomain::InsuranceAdvisor, &headers, &body)?;
    Ok(persona_stream(state, profile, query.format))
}

pub(super) async fn student_persona_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let profile = decode_profile(PersonaDomain::Tutor, &headers, &body)?;
    Ok(persona_stream(state, profile, query.format))
}

fn persona_stream(
    state: AppState,
    profile: Profile,
    format: WireFormat,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let domain = profile.domain();
    let summary = summarize(&profile);
    let prompt = build_prompt(&summary, domain);

    // Students also get the dashboard analysis, multiplexed into the same stream.
    let analysis: Option<AnalysisFuture> = match profile {
        Profile::Student(_) => {
            let client = state.client.clone();
            let structured_prompt = build_structured_prompt(&summary);
            Some(Box::pin(async move {
                client.generate_structured(&structured_prompt).await
            }))
        }
        Profile::Customer(_) => None,
    };

    let preamble = vec![
        RelayFrame::Stage {
            stage: "summarizing".to_owned(),
        },
        RelayFrame::Summary { text: summary },
    ];

    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(async move {
        let trace = GenerationTrace::begin(domain, state.client.model_id(), &prompt);
        let mut relay = Relay::new(state.poll_interval);
        let report = relay
            .run(&state.client, prompt, preamble, analysis, &tx)
            .await;
        info!(
            domain = %domain,
            dequeued = report.dequeued,
            words = report.word_count,
            outcome = ?report.outcome,
            "persona stream finished"
        );
        let trace = match &report.outcome {
            RelayOutcome::Completed { .. } => trace.finish(&report.text),
            RelayOutcome::Failed { message } => trace.fail(&report.text, message),
            RelayOutcome::Disconnected => trace.fail(&report.text, "client disconnected"),
        };
        state.telemetry.record_generation(trace);
    });

    let frames = ReceiverStream::new(rx).map(move |frame| encode(&frame, format).into_sse_event());
    Sse::new(frames).keep_alive(KeepAlive::default())
}

// ── Structured analysis ──────────────────────────────────────

pub(super) async fn student_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let profile = decode_profile(PersonaDomain::Tutor, &headers, &body)?;
    let summary = summarize(&profile);
    let analysis = state
        .client
        .generate_structured(&build_structured_prompt(&summary))
        .await?;
    Ok(Json(json!({
        "profile_text": summary,
        "analysis": analysis,
    })))
}
