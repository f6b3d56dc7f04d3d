//! Drain loop tests over hand-fed queues.

use std::time::Duration;

use tokio::sync::mpsc;

use persona_relay::generation::GenerationEvent;
use persona_relay::relay::{
    Relay, RelayFrame, RelayOutcome, RelayReport, RelayState, StreamStatus,
};

const POLL: Duration = Duration::from_millis(100);

async fn drain_frames(
    events: Vec<GenerationEvent>,
    task: tokio::task::JoinHandle<()>,
    tx: Option<mpsc::UnboundedSender<GenerationEvent>>,
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
) -> (Vec<RelayFrame>, RelayReport, Relay) {
    if let Some(tx) = tx {
        for event in events {
            tx.send(event).expect("queue open");
        }
    }
    let (out_tx, mut out_rx) = mpsc::channel(32);
    let mut relay = Relay::new(POLL);
    let report = relay.drain(rx, task, None, &out_tx).await;
    drop(out_tx);

    let mut frames = Vec::new();
    while let Some(frame) = out_rx.recv().await {
        frames.push(frame);
    }
    (frames, report, relay)
}

#[tokio::test(start_paused = true)]
async fn prefilled_queue_drains_without_waiting() {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async {});
    let events = vec![
        GenerationEvent::Started,
        GenerationEvent::Token {
            text: "Calm ".to_owned(),
            word_count: 1,
        },
        GenerationEvent::Token {
            text: "saver".to_owned(),
            word_count: 2,
        },
        GenerationEvent::Completed {
            elapsed_seconds: 0.5,
        },
    ];

    let started = tokio::time::Instant::now();
    let (frames, report, relay) = drain_frames(events, task, Some(tx), rx).await;
    assert!(started.elapsed() < POLL, "no poll interval should elapse");
    assert_eq!(report.dequeued, 4);
    let outcome = report.outcome;

    assert_eq!(frames.len(), 5);
    assert_eq!(
        frames[0],
        RelayFrame::Stage {
            stage: "generating".to_owned()
        }
    );
    assert_eq!(
        frames[3],
        RelayFrame::Completed {
            elapsed_seconds: 0.5,
            word_count: 2,
            text: "Calm saver".to_owned(),
        }
    );
    assert!(matches!(
        frames[4],
        RelayFrame::StreamEnd {
            status: StreamStatus::Completed,
            ..
        }
    ));
    assert_eq!(outcome, RelayOutcome::Completed { elapsed_seconds: 0.5 });
    assert_eq!(relay.state(), RelayState::Closed);
}

#[tokio::test(start_paused = true)]
async fn failed_event_is_forwarded_then_stream_end() {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async {});
    let events = vec![
        GenerationEvent::Started,
        GenerationEvent::Failed {
            message: "rate limited".to_owned(),
        },
    ];

    let (frames, report, _) = drain_frames(events, task, Some(tx), rx).await;
    let outcome = report.outcome;
    assert_eq!(frames.len(), 3);
    assert_eq!(
        frames[1],
        RelayFrame::Failed {
            message: "rate limited".to_owned()
        }
    );
    assert!(matches!(
        frames[2],
        RelayFrame::StreamEnd {
            status: StreamStatus::Failed,
            ..
        }
    ));
    assert!(matches!(outcome, RelayOutcome::Failed { .. }));
}

#[tokio::test(start_paused = true)]
async fn producer_exit_without_terminal_degrades_to_failure() {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async {});
    let events = vec![
        GenerationEvent::Started,
        GenerationEvent::Token {
            text: "half".to_owned(),
            word_count: 1,
        },
    ];

    // Sender dropped inside the helper once the events are queued.
    let (frames, report, relay) = drain_frames(events, task, Some(tx), rx).await;
    let outcome = report.outcome;

    let terminals: Vec<_> = frames.iter().filter(|f| f.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);
    match &frames[frames.len() - 2] {
        RelayFrame::Failed { message } => {
            assert!(message.contains("without a terminal event"), "{message}");
        }
        other => panic!("expected failure frame, got {other:?}"),
    }
    assert!(matches!(frames.last(), Some(RelayFrame::StreamEnd { .. })));
    assert!(matches!(outcome, RelayOutcome::Failed { .. }));
    assert_eq!(relay.state(), RelayState::Closed);
}

#[tokio::test(start_paused = true)]
async fn producer_panic_degrades_to_failure() {
    let (tx, rx) = mpsc::unbounded_channel::<GenerationEvent>();
    let task = tokio::spawn(async move {
        let _tx = tx;
        panic!("provider exploded");
    });

    let (frames, report, _) = drain_frames(vec![], task, None, rx).await;
    let outcome = report.outcome;
    assert_eq!(frames.len(), 2);
    match &frames[0] {
        RelayFrame::Failed { message } => assert!(message.contains("panicked"), "{message}"),
        other => panic!("expected failure frame, got {other:?}"),
    }
    assert!(matches!(outcome, RelayOutcome::Failed { .. }));
}

#[tokio::test(start_paused = true)]
async fn slow_producer_is_waited_for_across_poll_intervals() {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let _ = tx.send(GenerationEvent::Started);
        tokio::time::sleep(Duration::from_millis(350)).await;
        let _ = tx.send(GenerationEvent::Completed {
            elapsed_seconds: 0.35,
        });
    });

    let (frames, report, _) = drain_frames(vec![], task, None, rx).await;
    let outcome = report.outcome;
    assert_eq!(frames.len(), 3);
    assert_eq!(outcome, RelayOutcome::Completed { elapsed_seconds: 0.35 });
}

#[tokio::test(start_paused = true)]
async fn dropped_outbound_side_reports_disconnect() {
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(GenerationEvent::Started).expect("queue open");
    let task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);
    });

    let (out_tx, out_rx) = mpsc::channel(4);
    drop(out_rx);
    let mut relay = Relay::new(POLL);
    let report = relay.drain(rx, task, None, &out_tx).await;

    assert_eq!(report.outcome, RelayOutcome::Disconnected);
    assert_eq!(report.dequeued, 1);
    assert_eq!(relay.state(), RelayState::Closed);
}
