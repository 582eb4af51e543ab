//! The signal-routing graph: per-source lanes into one mix bus.
//!
//! Topology is fixed at build time: every audio track gets a source node
//! and its own gain stage wired into the shared destination, and the
//! destination feeds an analyser tap. Nothing is re-patched afterwards;
//! muting only flips the enabled flag on an existing lane.
//!
//! A pump task drains the lanes on a fixed cadence, resamples each block to
//! the context rate, and pushes the mixed result to the encoder stream and
//! the analyser ring. While the context is suspended the pump still drains
//! (so a resume never replays audio from the pause gap) but emits nothing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capture::{AcquiredSources, TrackTap, VideoPreview};
use crate::error::EngineError;

use super::context::{ContextState, MixContext};
use super::mixer;

/// Analyser ring capacity: about half a second at the default rate.
const ANALYSER_CAPACITY: usize = 8_192;

/// Read tap on the mix bus for the visualizer. Clones share one ring.
#[derive(Clone)]
pub struct AnalyserTap {
    ring: Arc<Mutex<VecDeque<f32>>>,
}

impl AnalyserTap {
    fn new() -> Self {
        Self {
            ring: Arc::new(Mutex::new(VecDeque::with_capacity(ANALYSER_CAPACITY))),
        }
    }

    fn write(&self, samples: &[f32]) {
        let Ok(mut ring) = self.ring.lock() else {
            return;
        };
        if samples.len() >= ANALYSER_CAPACITY {
            ring.clear();
            ring.extend(&samples[samples.len() - ANALYSER_CAPACITY..]);
            return;
        }
        let overflow = (ring.len() + samples.len()).saturating_sub(ANALYSER_CAPACITY);
        if overflow > 0 {
            ring.drain(0..overflow);
        }
        ring.extend(samples);
    }

    /// Most recent `len` samples, zero-padded at the front when the ring
    /// holds fewer.
    pub fn snapshot(&self, len: usize) -> Vec<f32> {
        let Ok(ring) = self.ring.lock() else {
            return vec![0.0; len];
        };
        let mut out = vec![0.0f32; len];
        let take = ring.len().min(len);
        let start = ring.len() - take;
        for (i, sample) in ring.iter().skip(start).enumerate() {
            out[len - take + i] = *sample;
        }
        out
    }
}

/// One source's path into the mix bus: source node plus gain stage.
struct SourceLane {
    tap: TrackTap,
    gain: Mutex<f32>,
    /// RMS of the lane's last post-gain block. Probe for level metering.
    level: Mutex<f32>,
}

struct GraphCore {
    context: MixContext,
    lanes: Vec<SourceLane>,
    analyser: AnalyserTap,
    mixed_tx: mpsc::UnboundedSender<Vec<f32>>,
    ended_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Stream of mixed sample blocks, consumed by the encoder pipeline.
pub type MixedStream = mpsc::UnboundedReceiver<Vec<f32>>;

/// What the graph hands to the rest of the engine at build time.
pub struct GraphOutputs {
    pub mixed: MixedStream,
    pub analyser: AnalyserTap,
    /// Raw video passthrough for display sources. Preview only.
    pub video_preview: Option<VideoPreview>,
    /// Fires once when every routed track has ended.
    pub source_ended: oneshot::Receiver<()>,
}

pub struct AudioGraph {
    core: Arc<GraphCore>,
    token: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl AudioGraph {
    /// Wire every audio track of the acquired sources into the mix bus.
    pub fn build(context: MixContext, sources: &AcquiredSources) -> (Self, GraphOutputs) {
        let mut lanes = Vec::new();
        for track in &sources.primary.audio_tracks {
            lanes.push(SourceLane {
                tap: track.tap(),
                gain: Mutex::new(1.0),
                level: Mutex::new(0.0),
            });
        }
        if let Some(secondary) = &sources.secondary {
            for track in &secondary.audio_tracks {
                lanes.push(SourceLane {
                    tap: track.tap(),
                    gain: Mutex::new(1.0),
                    level: Mutex::new(0.0),
                });
            }
        }
        debug!("Audio graph built with {} source lane(s)", lanes.len());

        let (mixed_tx, mixed_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = oneshot::channel();
        let analyser = AnalyserTap::new();

        let core = Arc::new(GraphCore {
            context,
            lanes,
            analyser: analyser.clone(),
            mixed_tx,
            ended_tx: Mutex::new(Some(ended_tx)),
        });

        let graph = Self {
            core,
            token: CancellationToken::new(),
            pump: None,
        };
        let video_preview = sources.primary.preview();
        let outputs = GraphOutputs {
            mixed: mixed_rx,
            analyser,
            video_preview,
            source_ended: ended_rx,
        };
        (graph, outputs)
    }

    /// Start the periodic pump.
    pub fn start_pump(&mut self, period: Duration) {
        let core = self.core.clone();
        let token = self.token.clone();
        self.pump = Some(tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => pump_once(&core),
                }
            }
            debug!("Graph pump stopped");
        }));
    }

    /// Run one pump cycle synchronously. The pump task calls this; tests
    /// call it directly for deterministic stepping.
    pub fn pump_now(&self) {
        pump_once(&self.core);
    }

    pub fn suspend(&self) {
        self.core.context.suspend();
    }

    pub fn resume(&self) {
        self.core.context.resume();
    }

    pub fn context_state(&self) -> ContextState {
        self.core.context.state()
    }

    /// Set the gain stage of one lane. Topology is untouched.
    pub fn set_gain(&self, track_id: Uuid, gain: f32) {
        for lane in &self.core.lanes {
            if lane.tap.track_id() == track_id {
                if let Ok(mut g) = lane.gain.lock() {
                    *g = gain;
                }
            }
        }
    }

    /// RMS level of each lane's last post-gain block, keyed by track id.
    pub fn lane_levels(&self) -> Vec<(Uuid, f32)> {
        self.core
            .lanes
            .iter()
            .map(|lane| {
                let level = lane.level.lock().map(|l| *l).unwrap_or(0.0);
                (lane.tap.track_id(), level)
            })
            .collect()
    }

    /// Node count: one source and one gain node per lane, plus the
    /// destination and the analyser.
    pub fn node_count(&self) -> usize {
        self.core.lanes.len() * 2 + 2
    }

    /// Connection count: source→gain and gain→destination per lane, plus
    /// destination→analyser.
    pub fn connection_count(&self) -> usize {
        self.core.lanes.len() * 2 + 1
    }

    /// Cancel the pump and close the context. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.pump.take() {
            if let Err(e) = handle.await {
                warn!(
                    "{}",
                    EngineError::Resource(format!("graph pump task failed: {e}"))
                );
            }
        }
        if self.core.context.close() {
            debug!("Mix context closed");
        }
    }
}

fn pump_once(core: &GraphCore) {
    let state = core.context.state();
    if state == ContextState::Closed {
        return;
    }
    let suspended = state == ContextState::Suspended;

    let mut blocks = Vec::with_capacity(core.lanes.len());
    let mut any_live = false;
    for lane in &core.lanes {
        // Drain even while suspended so a resume never replays the gap.
        let raw = lane.tap.drain();
        if lane.tap.is_live() {
            any_live = true;
        }
        if suspended {
            continue;
        }

        let mut block = mixer::resample(&raw, lane.tap.sample_rate(), core.context.sample_rate());
        if !lane.tap.is_enabled() {
            block.iter_mut().for_each(|s| *s = 0.0);
        }
        let gain = lane.gain.lock().map(|g| *g).unwrap_or(1.0);
        mixer::apply_gain(&mut block, gain);
        if let Ok(mut level) = lane.level.lock() {
            *level = mixer::rms(&block);
        }
        blocks.push(block);
    }

    if !any_live && !core.lanes.is_empty() {
        if let Ok(mut ended) = core.ended_tx.lock() {
            if let Some(tx) = ended.take() {
                debug!("All routed tracks have ended");
                let _ = tx.send(());
            }
        }
    }
    if suspended {
        return;
    }

    let mixed = mixer::mix(&blocks);
    if !mixed.is_empty() {
        core.analyser.write(&mixed);
        let _ = core.mixed_tx.send(mixed);
    }
}
