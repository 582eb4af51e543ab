//! The session state machine.
//!
//! Orchestrates acquisition → graph → visualizer → encoder in dependency
//! order, owns the pausable clock, and guarantees teardown on every exit
//! path. Exactly one session is active per machine; a second start is
//! rejected, never interleaved.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::{
    acquire_sources, AcquiredSources, CaptureConstraints, CaptureProvider, SourceKind,
    VideoPreview,
};
use crate::config::Config;
use crate::encoder::{negotiate, EncoderPipeline, OutputArtifact};
use crate::error::EngineError;
use crate::graph::{AudioGraph, MixContext};
use crate::visualizer::{RenderSink, Visualizer};

use super::clock::SessionClock;
use super::events::{EngineEvent, EventSender};
use super::status::{SessionPhase, SessionStatusHandle};
use super::teardown::Teardown;

/// What a successful start hands back to the embedding layer.
#[derive(Debug)]
pub struct StartOutcome {
    pub session_id: Uuid,
    /// Raw video passthrough for display sessions. Preview only; the
    /// encoder never sees it.
    pub video_preview: Option<VideoPreview>,
}

/// Topology probe for the embedding layer and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub node_count: usize,
    pub connection_count: usize,
}

struct ActiveSession {
    id: Uuid,
    kind: SourceKind,
    graph: AudioGraph,
    visualizer: Visualizer,
    clock: SessionClock,
    encoder: EncoderPipeline,
    sources: AcquiredSources,
}

#[derive(Clone)]
pub struct RecordingMachine {
    provider: Arc<dyn CaptureProvider>,
    config: Arc<Config>,
    sink: Arc<dyn RenderSink>,
    status: SessionStatusHandle,
    events: EventSender,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl RecordingMachine {
    pub fn new(
        provider: Arc<dyn CaptureProvider>,
        config: Config,
        sink: Arc<dyn RenderSink>,
        events: EventSender,
    ) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            sink,
            status: SessionStatusHandle::new(events.clone()),
            events,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    /// Begin a session: acquire sources, wire the graph, start the
    /// visualizer, encoder, and clock. Any failure surfaces one terminal
    /// error and releases whatever was already built.
    pub async fn start(
        &self,
        kind: SourceKind,
        constraints: CaptureConstraints,
    ) -> Result<StartOutcome, EngineError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(EngineError::InvalidState(
                "a session is already active".to_string(),
            ));
        }

        let session_id = Uuid::new_v4();
        info!("Starting {} session {}", kind.as_str(), session_id);
        self.status.begin_acquiring(session_id, kind).await;

        let mut sources = match acquire_sources(self.provider.as_ref(), kind, &constraints).await {
            Ok(sources) => sources,
            Err(e) => return Err(self.fail_setup(e).await),
        };

        let context = match MixContext::new(self.config.engine.sample_rate) {
            Ok(context) => context,
            Err(e) => {
                sources.stop_all();
                return Err(self.fail_setup(e).await);
            }
        };

        let (mut graph, outputs) = AudioGraph::build(context, &sources);
        graph.start_pump(Duration::from_millis(self.config.engine.pump_interval_ms.max(1)));

        let visualizer = Visualizer::spawn(
            outputs.analyser,
            self.sink.clone(),
            &self.config.visualizer,
        );
        let encoder = EncoderPipeline::spawn(
            outputs.mixed,
            negotiate(
                &self.config.encoder.preferred_formats,
                self.config.engine.sample_rate,
            ),
            Duration::from_millis(self.config.encoder.timeslice_ms.max(1)),
        );
        let clock = SessionClock::spawn(
            self.status.clone(),
            Duration::from_millis(self.config.engine.clock_tick_ms.max(1)),
        );

        self.status.set_phase(SessionPhase::Live).await;
        info!("Session {} live, container {}", session_id, encoder.mime_type());

        // Degrade gracefully when the platform ends every routed track
        // mid-session: stop and keep whatever was encoded.
        let watcher = self.clone();
        let ended = outputs.source_ended;
        tokio::spawn(async move {
            if ended.await.is_ok() {
                warn!("All capture tracks ended; stopping session");
                let _ = watcher.stop().await;
            }
        });

        let video_preview = outputs.video_preview;
        *active = Some(ActiveSession {
            id: session_id,
            kind,
            graph,
            visualizer,
            clock,
            encoder,
            sources,
        });
        Ok(StartOutcome {
            session_id,
            video_preview,
        })
    }

    /// Suspend the clock, the mix context, and chunk emission, in that
    /// order. Valid only while live.
    pub async fn pause(&self) -> Result<(), EngineError> {
        let active = self.active.lock().await;
        let session = active
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("no active session".to_string()))?;
        if self.status.phase().await != SessionPhase::Live {
            return Err(EngineError::InvalidState(
                "pause is only valid while live".to_string(),
            ));
        }

        session.clock.pause();
        session.graph.suspend();
        session.encoder.pause();
        self.status.set_phase(SessionPhase::Paused).await;
        info!("Session {} paused", session.id);
        Ok(())
    }

    /// Resume emission, the mix context, and the clock, reversing the
    /// suspension order. Valid only while paused.
    pub async fn resume(&self) -> Result<(), EngineError> {
        let active = self.active.lock().await;
        let session = active
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("no active session".to_string()))?;
        if self.status.phase().await != SessionPhase::Paused {
            return Err(EngineError::InvalidState(
                "resume is only valid while paused".to_string(),
            ));
        }

        session.encoder.resume();
        session.graph.resume();
        session.clock.resume();
        self.status.set_phase(SessionPhase::Live).await;
        info!("Session {} resumed", session.id);
        Ok(())
    }

    /// Finalize the artifact and release every resource. The session
    /// reaches Stopped even when finalization reports an empty artifact.
    /// Calling stop again is a no-op error; nothing runs twice.
    pub async fn stop(&self) -> Result<OutputArtifact, EngineError> {
        let mut active = self.active.lock().await;
        let Some(mut session) = active.take() else {
            return Err(EngineError::InvalidState(
                "no active session to stop".to_string(),
            ));
        };

        self.status.set_phase(SessionPhase::Stopping).await;
        info!("Stopping {} session {}", session.kind.as_str(), session.id);

        let artifact_result = session.encoder.finalize().await;

        let AcquiredSources { primary, secondary } = session.sources;
        let mut sources = vec![primary];
        sources.extend(secondary);
        let mut teardown = Teardown::new(
            Some(session.visualizer),
            Some(session.clock),
            Some(session.graph),
            sources,
        );
        teardown.run().await;

        match artifact_result {
            Ok(artifact) => {
                self.status.set_phase(SessionPhase::Stopped).await;
                self.events.send(EngineEvent::Stopped {
                    artifact: artifact.clone(),
                });
                info!(
                    "Session stopped: {} bytes ({})",
                    artifact.size_bytes, artifact.mime_type
                );
                Ok(artifact)
            }
            Err(e) => {
                self.status.set_phase(SessionPhase::Stopped).await;
                self.events.send(EngineEvent::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                error!("Session finalization failed: {e}");
                Err(e)
            }
        }
    }

    /// Screen mode: silence or restore the secondary microphone
    /// contribution. The system-audio lane and the graph topology are
    /// untouched. No-op when no secondary source was acquired.
    pub async fn set_muted(&self, muted: bool) -> Result<(), EngineError> {
        let active = self.active.lock().await;
        let session = active
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("no active session".to_string()))?;

        let Some(secondary) = &session.sources.secondary else {
            debug!("Mute toggle ignored: no secondary microphone source");
            return Ok(());
        };
        secondary.set_audio_enabled(!muted);
        self.status.set_muted(muted).await;
        info!(
            "Microphone contribution {}",
            if muted { "muted" } else { "unmuted" }
        );
        Ok(())
    }

    /// External disposal hook for embedders whose lifecycle may fire more
    /// than once for a single logical session. Stops the active session if
    /// there is one; otherwise does nothing.
    pub async fn dispose(&self) {
        match self.stop().await {
            Ok(_) => info!("Disposed active session"),
            Err(EngineError::InvalidState(_)) => debug!("Dispose with no active session"),
            Err(e) => warn!("Dispose stop failed: {e}"),
        }
    }

    pub async fn graph_snapshot(&self) -> Option<GraphSnapshot> {
        let active = self.active.lock().await;
        active.as_ref().map(|session| GraphSnapshot {
            node_count: session.graph.node_count(),
            connection_count: session.graph.connection_count(),
        })
    }

    pub async fn chunk_count(&self) -> usize {
        let active = self.active.lock().await;
        active
            .as_ref()
            .map(|session| session.encoder.chunk_count())
            .unwrap_or(0)
    }

    async fn fail_setup(&self, err: EngineError) -> EngineError {
        error!("Session setup failed: {err}");
        self.status.set_error(err.to_string()).await;
        self.events.send(EngineEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticProvider;
    use crate::visualizer::NullSink;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.engine.pump_interval_ms = 10;
        config.engine.clock_tick_ms = 25;
        config.encoder.timeslice_ms = 20;
        config.visualizer.frame_interval_ms = 10;
        config
    }

    fn machine_with(provider: SyntheticProvider) -> RecordingMachine {
        RecordingMachine::new(
            Arc::new(provider),
            test_config(),
            Arc::new(NullSink),
            EventSender::default(),
        )
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let provider = SyntheticProvider::new(16_000);
        let machine = machine_with(provider);
        machine
            .start(SourceKind::Microphone, CaptureConstraints::microphone())
            .await
            .unwrap();
        let err = machine
            .start(SourceKind::Microphone, CaptureConstraints::microphone())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        let _ = machine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_session_is_invalid() {
        let machine = machine_with(SyntheticProvider::new(16_000));
        assert!(matches!(
            machine.stop().await,
            Err(EngineError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_requires_live() {
        let machine = machine_with(SyntheticProvider::new(16_000));
        assert!(machine.pause().await.is_err());
    }
}
