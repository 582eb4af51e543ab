//! End-to-end session lifecycle tests against the synthetic capture
//! backend: no hardware, real tasks.

use std::sync::Arc;
use std::time::Duration;

use confab::session::{EngineEvent, EventSender, RecordingMachine, SessionPhase};
use confab::visualizer::NullSink;
use confab::{CaptureConstraints, Config, EngineError, ErrorKind, SourceKind, SyntheticProvider};
use tokio::sync::mpsc::UnboundedReceiver;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.engine.sample_rate = 16_000;
    config.engine.pump_interval_ms = 10;
    config.engine.clock_tick_ms = 25;
    config.encoder.timeslice_ms = 20;
    config.visualizer.frame_interval_ms = 10;
    config
}

fn build_machine(
    provider: SyntheticProvider,
) -> (RecordingMachine, UnboundedReceiver<EngineEvent>) {
    let (events, rx) = EventSender::channel();
    let machine = RecordingMachine::new(
        Arc::new(provider),
        fast_config(),
        Arc::new(NullSink),
        events,
    );
    (machine, rx)
}

fn drain_events(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn stopped_count(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Stopped { .. }))
        .count()
}

fn error_kinds(events: &[EngineEvent]) -> Vec<ErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Error { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

async fn wait_for_phase(machine: &RecordingMachine, phase: SessionPhase) -> bool {
    for _ in 0..200 {
        if machine.status().phase().await == phase {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn mic_session_yields_nonempty_artifact() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, mut rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();

    for _ in 0..10 {
        provider.feed_microphone(&[0.3; 320]);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let state = machine.status().get().await;
    assert!(
        state.elapsed_seconds >= 1,
        "clock should have ticked, got {}",
        state.elapsed_seconds
    );
    assert_eq!(state.source_kind, Some(SourceKind::Microphone));

    let artifact = machine.stop().await.unwrap();
    assert!(artifact.size_bytes > 0);
    assert_eq!(artifact.mime_type, "audio/wav");
    assert_eq!(artifact.bytes.len(), artifact.size_bytes);
    // The negotiated container frames the stream once, up front.
    assert_eq!(&artifact.bytes[0..4], b"RIFF");

    assert_eq!(machine.status().phase().await, SessionPhase::Stopped);
    let events = drain_events(&mut rx);
    assert_eq!(stopped_count(&events), 1);
    assert!(error_kinds(&events).is_empty());
}

#[tokio::test]
async fn event_stream_walks_the_lifecycle_in_order() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, mut rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    provider.feed_microphone(&[0.2; 320]);
    tokio::time::sleep(Duration::from_millis(60)).await;
    machine.stop().await.unwrap();

    let phases: Vec<SessionPhase> = drain_events(&mut rx)
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StateChanged { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect();

    let first_live = phases.iter().position(|p| *p == SessionPhase::Live);
    let stopping = phases.iter().position(|p| *p == SessionPhase::Stopping);
    let stopped = phases.iter().position(|p| *p == SessionPhase::Stopped);
    assert_eq!(phases.first(), Some(&SessionPhase::Acquiring));
    assert!(first_live.unwrap() < stopping.unwrap());
    assert!(stopping.unwrap() < stopped.unwrap());
}

#[tokio::test]
async fn elapsed_time_is_monotonic_and_frozen_while_paused() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, _rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    provider.feed_microphone(&[0.2; 320]);
    tokio::time::sleep(Duration::from_millis(110)).await;

    machine.pause().await.unwrap();
    assert_eq!(machine.status().phase().await, SessionPhase::Paused);
    // Let any in-flight tick land before sampling.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let frozen = machine.status().get().await.elapsed_seconds;
    let chunks_at_pause = machine.chunk_count().await;

    // Input during the pause is discarded, not queued.
    for _ in 0..5 {
        provider.feed_microphone(&[0.5; 320]);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(machine.status().get().await.elapsed_seconds, frozen);
    assert_eq!(machine.chunk_count().await, chunks_at_pause);

    machine.resume().await.unwrap();
    assert_eq!(machine.status().phase().await, SessionPhase::Live);
    provider.feed_microphone(&[0.2; 320]);
    tokio::time::sleep(Duration::from_millis(110)).await;
    let resumed = machine.status().get().await.elapsed_seconds;
    assert!(resumed > frozen);

    machine.stop().await.unwrap();
}

#[tokio::test]
async fn pause_is_rejected_unless_live() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, _rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    machine.pause().await.unwrap();
    assert!(matches!(
        machine.pause().await,
        Err(EngineError::InvalidState(_))
    ));
    assert!(matches!(
        machine.resume().await,
        Ok(())
    ));
    assert!(matches!(
        machine.resume().await,
        Err(EngineError::InvalidState(_))
    ));
    provider.feed_microphone(&[0.2; 320]);
    tokio::time::sleep(Duration::from_millis(40)).await;
    machine.stop().await.unwrap();
}

#[tokio::test]
async fn stop_twice_finalizes_once() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, mut rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    provider.feed_microphone(&[0.2; 320]);
    tokio::time::sleep(Duration::from_millis(60)).await;

    machine.stop().await.unwrap();
    assert!(matches!(
        machine.stop().await,
        Err(EngineError::InvalidState(_))
    ));
    machine.dispose().await;

    let events = drain_events(&mut rx);
    assert_eq!(stopped_count(&events), 1);
}

#[tokio::test]
async fn silent_session_surfaces_encoding_error_but_still_stops() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, mut rx) = build_machine(provider);

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    // No samples ever arrive.
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(matches!(
        machine.stop().await,
        Err(EngineError::Encoding)
    ));
    assert_eq!(machine.status().phase().await, SessionPhase::Stopped);

    let events = drain_events(&mut rx);
    assert_eq!(stopped_count(&events), 0);
    assert_eq!(error_kinds(&events), vec![ErrorKind::Encoding]);
}

#[tokio::test]
async fn microphone_denial_is_fatal_and_creates_no_session() {
    let provider = SyntheticProvider::new(16_000).deny_microphone();
    let (machine, mut rx) = build_machine(provider);

    let err = machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Permission(_)));
    assert_eq!(machine.status().phase().await, SessionPhase::Error);
    assert_eq!(machine.chunk_count().await, 0);

    let events = drain_events(&mut rx);
    assert_eq!(stopped_count(&events), 0);
    assert_eq!(error_kinds(&events), vec![ErrorKind::Permission]);

    // Nothing to stop afterwards.
    assert!(matches!(
        machine.stop().await,
        Err(EngineError::InvalidState(_))
    ));
}

#[tokio::test]
async fn ended_tracks_stop_the_session_gracefully() {
    let provider = SyntheticProvider::new(16_000);
    let (machine, mut rx) = build_machine(provider.clone());

    machine
        .start(SourceKind::Microphone, CaptureConstraints::microphone())
        .await
        .unwrap();
    for _ in 0..4 {
        provider.feed_microphone(&[0.3; 320]);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    provider.end_all_tracks();
    assert!(
        wait_for_phase(&machine, SessionPhase::Stopped).await,
        "session should stop itself when every track ends"
    );

    let events = drain_events(&mut rx);
    assert_eq!(stopped_count(&events), 1, "forced stop still reports once");
}
