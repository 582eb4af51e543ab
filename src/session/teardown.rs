//! Idempotent release of everything a session holds.
//!
//! Order matters: the frame loop and clock go first so nothing reads the
//! graph after it closes, then the graph (pump + context), then the
//! hardware tracks. Every step is best-effort; failures are logged as
//! resource errors and never escalate.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::capture::CaptureSource;
use crate::graph::AudioGraph;
use crate::session::clock::SessionClock;
use crate::visualizer::Visualizer;

pub struct Teardown {
    done: AtomicBool,
    visualizer: Option<Visualizer>,
    clock: Option<SessionClock>,
    graph: Option<AudioGraph>,
    sources: Vec<CaptureSource>,
}

impl Teardown {
    pub fn new(
        visualizer: Option<Visualizer>,
        clock: Option<SessionClock>,
        graph: Option<AudioGraph>,
        sources: Vec<CaptureSource>,
    ) -> Self {
        Self {
            done: AtomicBool::new(false),
            visualizer,
            clock,
            graph,
            sources,
        }
    }

    /// Release every held resource exactly once. Later calls are no-ops.
    pub async fn run(&mut self) {
        if self.done.swap(true, Ordering::SeqCst) {
            debug!("Teardown already ran, skipping");
            return;
        }

        if let Some(mut visualizer) = self.visualizer.take() {
            visualizer.halt().await;
        }
        if let Some(mut clock) = self.clock.take() {
            clock.halt().await;
        }
        if let Some(mut graph) = self.graph.take() {
            graph.shutdown().await;
        }
        for source in &mut self.sources {
            source.stop_all();
        }
        self.sources.clear();
        info!("Session resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{AudioTrack, CaptureSource, SourceKind};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_twice_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();

        let mut source = CaptureSource::new(SourceKind::Microphone);
        source.audio_tracks.push(
            AudioTrack::new("mic", 16_000).with_stopper(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut teardown = Teardown::new(None, None, None, vec![source]);
        teardown.run().await;
        teardown.run().await;
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_teardown_is_fine() {
        let mut teardown = Teardown::new(None, None, None, Vec::new());
        teardown.run().await;
        teardown.run().await;
    }
}
