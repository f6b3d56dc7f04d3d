//! Event relay: bridges a background generation task to one ordered
//! outbound frame stream.
//!
//! ```text
//!   GenerationClient task ──(unbounded mpsc)──▶ drain loop ──(bounded mpsc)──▶ transport
//!                                                   ▲
//!                      structured analysis task ────┘ (optional, multiplexed)
//! ```
//!
//! State machine: `Idle → Running → Draining → Closed`.
//!
//! The drain loop waits for the next event with a bounded timeout and
//! re-checks its guard on every pass: it keeps going while the generation
//! task is still running **or** the queue still holds events. A terminal
//! event (`Completed` / `Failed`) ends the loop; it is always followed by
//! exactly one [`RelayFrame::StreamEnd`], and nothing after that. Internal
//! faults (task panic, task exiting without a terminal event) degrade to a
//! `Failed` frame rather than an unterminated stream.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::analysis::StructuredAnalysis;
use crate::generation::{GenerationClient, GenerationError, GenerationEvent, WordCounter};

/// A structured-analysis call running alongside the token stream.
pub type AnalysisFuture =
    Pin<Box<dyn Future<Output = Result<StructuredAnalysis, GenerationError>> + Send>>;

type AnalysisResult = Result<StructuredAnalysis, GenerationError>;

/// Default bounded wait between guard checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// How a relayed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// Generation completed.
    Completed,
    /// Generation or relay failed.
    Failed,
}

/// What the relay writes to the outbound stream, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Progress marker (`summarizing`, `generating`, `analysing`, ...).
    Stage {
        /// Stage name.
        stage: String,
    },
    /// The deterministic profile summary the prompt was built from.
    Summary {
        /// Summary text.
        text: String,
    },
    /// A generated text fragment.
    Token {
        /// Fragment text.
        text: String,
        /// Running word count.
        word_count: usize,
    },
    /// Structured analysis arrived from the multiplexed call.
    Analysis {
        /// The complete analysis.
        analysis: StructuredAnalysis,
    },
    /// The multiplexed structured call failed. Not terminal.
    AnalysisUnavailable {
        /// Human-readable cause.
        message: String,
    },
    /// Terminal: generation completed.
    Completed {
        /// Seconds from `Started` to end-of-stream.
        elapsed_seconds: f64,
        /// Final word count.
        word_count: usize,
        /// Full generated text.
        text: String,
    },
    /// Terminal: generation or relay failed.
    Failed {
        /// Human-readable cause.
        message: String,
    },
    /// Synthetic end-of-stream marker written right after the terminal frame.
    StreamEnd {
        /// When the stream closed.
        timestamp: DateTime<Utc>,
        /// Terminal outcome.
        status: StreamStatus,
    },
}

impl RelayFrame {
    /// Whether this frame is `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    fn stage(name: &str) -> Self {
        Self::Stage {
            stage: name.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// State / outcome
// ---------------------------------------------------------------------------

/// Relay lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, nothing spawned.
    Idle,
    /// Generation task running, drain loop active.
    Running,
    /// Terminal event seen, flushing the tail.
    Draining,
    /// Done; nothing more will be written.
    Closed,
}

/// Faults inside the relay itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The generation task finished and the queue drained without a terminal event.
    #[error("generation ended without a terminal event")]
    MissingTerminal,
    /// The generation task panicked.
    #[error("generation task panicked: {0}")]
    TaskPanicked(String),
    /// The generation task was cancelled by the runtime.
    #[error("generation task was cancelled")]
    TaskCancelled,
}

/// How a relay run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// `Completed` + `StreamEnd` were written.
    Completed {
        /// Seconds reported by the generation.
        elapsed_seconds: f64,
    },
    /// `Failed` + `StreamEnd` were written.
    Failed {
        /// Failure message forwarded to the client.
        message: String,
    },
    /// The outbound side closed before the terminal frame could be written.
    Disconnected,
}

/// Summary of one relay run.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReport {
    /// Generation events taken off the queue.
    pub dequeued: usize,
    /// How the run ended.
    pub outcome: RelayOutcome,
    /// Text generated before the run ended.
    pub text: String,
    /// Final word count.
    pub word_count: usize,
}

/// The outbound side went away; stop writing.
struct Disconnected;

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Per-request relay. Owns its queue; never shared between requests.
#[derive(Debug)]
pub struct Relay {
    poll_interval: Duration,
    state: RelayState,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Relay {
    /// Create an idle relay with the given poll interval.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            state: RelayState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Run one streaming generation end to end.
    ///
    /// Spawns the generation task, writes `preamble`, then drains the
    /// task's events into `out`. `analysis`, when given, runs as its own
    /// task and its result is written before the terminal frame.
    pub async fn run(
        &mut self,
        client: &GenerationClient,
        prompt: String,
        preamble: Vec<RelayFrame>,
        analysis: Option<AnalysisFuture>,
        out: &mpsc::Sender<RelayFrame>,
    ) -> RelayReport {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = client.start_streaming(prompt, tx);
        self.state = RelayState::Running;
        debug!(model = %client.model_id(), "relay running");

        for frame in preamble {
            if out.send(frame).await.is_err() {
                self.state = RelayState::Closed;
                info!("client disconnected before generation output");
                return RelayReport {
                    dequeued: 0,
                    outcome: RelayOutcome::Disconnected,
                    text: String::new(),
                    word_count: 0,
                };
            }
        }

        self.drain(rx, task, analysis, out).await
    }

    /// Drain `rx` into `out` until a terminal event, then close.
    ///
    /// `task` is the background producer feeding `rx`. Exposed separately
    /// from [`Relay::run`] so the loop can be driven with hand-fed queues.
    pub async fn drain(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<GenerationEvent>,
        mut task: JoinHandle<()>,
        analysis: Option<AnalysisFuture>,
        out: &mpsc::Sender<RelayFrame>,
    ) -> RelayReport {
        self.state = RelayState::Running;
        // Spawned so it makes progress while tokens are backlogged or the
        // client is slow to read.
        let mut analysis: Option<JoinHandle<AnalysisResult>> = analysis.map(tokio::spawn);
        let mut dequeued: usize = 0;
        let mut counter = WordCounter::default();

        let terminal = loop {
            if task.is_finished() && rx.is_empty() {
                break Err(self.task_fault(&mut task).await);
            }

            tokio::select! {
                biased;

                // A finished analysis goes out ahead of any queued tokens.
                joined = next_analysis(&mut analysis), if analysis.is_some() => {
                    analysis = None;
                    if self.forward(out, analysis_frame(joined)).await.is_err() {
                        return self.disconnected(dequeued, counter);
                    }
                }

                received = tokio::time::timeout(self.poll_interval, rx.recv()) => {
                    let event = match received {
                        // Nothing yet; re-check the guard.
                        Err(_) => continue,
                        // Producer gone and queue empty without a terminal event.
                        Ok(None) => break Err(self.task_fault(&mut task).await),
                        Ok(Some(event)) => event,
                    };
                    dequeued = dequeued.saturating_add(1);

                    let frame = match event {
                        GenerationEvent::Started => RelayFrame::stage("generating"),
                        GenerationEvent::Token { text, word_count } => {
                            counter.push(&text);
                            RelayFrame::Token { text, word_count }
                        }
                        terminal @ (GenerationEvent::Completed { .. } | GenerationEvent::Failed { .. }) => {
                            break Ok(terminal);
                        }
                    };
                    if self.forward(out, frame).await.is_err() {
                        return self.disconnected(dequeued, counter);
                    }
                }
            }
        };

        self.state = RelayState::Draining;

        let terminal = match terminal {
            Ok(GenerationEvent::Completed { elapsed_seconds }) => {
                if let Some(pending) = analysis.take() {
                    if self.forward(out, RelayFrame::stage("analysing")).await.is_err() {
                        return self.disconnected(dequeued, counter);
                    }
                    let frame = analysis_frame(pending.await);
                    if self.forward(out, frame).await.is_err() {
                        return self.disconnected(dequeued, counter);
                    }
                }
                RelayFrame::Completed {
                    elapsed_seconds,
                    word_count: counter.count(),
                    text: counter.text().to_owned(),
                }
            }
            Ok(GenerationEvent::Failed { message }) => {
                abort_analysis(analysis.take());
                RelayFrame::Failed { message }
            }
            Ok(other) => RelayFrame::Failed {
                message: format!("unexpected terminal event: {other:?}"),
            },
            Err(fault) => {
                abort_analysis(analysis.take());
                warn!(error = %fault, dequeued, "relay fault, closing stream with failure");
                RelayFrame::Failed {
                    message: fault.to_string(),
                }
            }
        };

        let outcome = match &terminal {
            RelayFrame::Completed {
                elapsed_seconds, ..
            } => RelayOutcome::Completed {
                elapsed_seconds: *elapsed_seconds,
            },
            RelayFrame::Failed { message } => RelayOutcome::Failed {
                message: message.clone(),
            },
            _ => RelayOutcome::Failed {
                message: "relay produced a non-terminal closing frame".to_owned(),
            },
        };
        let status = match outcome {
            RelayOutcome::Completed { .. } => StreamStatus::Completed,
            _ => StreamStatus::Failed,
        };

        if self.forward(out, terminal).await.is_err() {
            return self.disconnected(dequeued, counter);
        }
        let end = RelayFrame::StreamEnd {
            timestamp: Utc::now(),
            status,
        };
        if self.forward(out, end).await.is_err() {
            return self.disconnected(dequeued, counter);
        }

        self.state = RelayState::Closed;
        debug!(dequeued, words = counter.count(), "relay closed");
        RelayReport {
            dequeued,
            outcome,
            word_count: counter.count(),
            text: counter.text().to_owned(),
        }
    }

    /// Classify why the producer stopped without a terminal event.
    ///
    /// Waits at most one poll interval for the task to settle.
    async fn task_fault(&self, task: &mut JoinHandle<()>) -> RelayError {
        match tokio::time::timeout(self.poll_interval, task).await {
            Err(_) | Ok(Ok(())) => RelayError::MissingTerminal,
            Ok(Err(e)) if e.is_panic() => RelayError::TaskPanicked(e.to_string()),
            Ok(Err(_)) => RelayError::TaskCancelled,
        }
    }

    async fn forward(
        &self,
        out: &mpsc::Sender<RelayFrame>,
        frame: RelayFrame,
    ) -> Result<(), Disconnected> {
        out.send(frame).await.map_err(|_| Disconnected)
    }

    fn disconnected(&mut self, dequeued: usize, counter: WordCounter) -> RelayReport {
        // The generation task is not aborted; it stops on its next emit
        // once the queue receiver has been dropped.
        self.state = RelayState::Closed;
        info!(dequeued, "client disconnected mid-stream");
        RelayReport {
            dequeued,
            outcome: RelayOutcome::Disconnected,
            word_count: counter.count(),
            text: counter.text().to_owned(),
        }
    }
}

async fn next_analysis(
    slot: &mut Option<JoinHandle<AnalysisResult>>,
) -> Result<AnalysisResult, JoinError> {
    match slot {
        Some(pending) => pending.await,
        // Guarded by `if analysis.is_some()` at the select site.
        None => std::future::pending().await,
    }
}

fn abort_analysis(pending: Option<JoinHandle<AnalysisResult>>) {
    if let Some(handle) = pending {
        handle.abort();
    }
}

fn analysis_frame(joined: Result<AnalysisResult, JoinError>) -> RelayFrame {
    let message = match joined {
        Ok(Ok(analysis)) => return RelayFrame::Analysis { analysis },
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("analysis task ended abnormally: {e}"),
    };
    warn!(error = %message, "structured analysis failed");
    RelayFrame::AnalysisUnavailable { message }
}
