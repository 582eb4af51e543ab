//! Amplitude/frequency feed for live rendering.
//!
//! A frame loop reads the analyser tap on its own cadence, computes 24
//! normalized RMS bars with EMA smoothing plus an FFT magnitude spectrum,
//! and hands each frame to the embedder's render sink. The loop is
//! cosmetic: it keeps running through pause/resume and never influences
//! recording correctness, but teardown must halt it explicitly: a frame
//! loop outliving its graph is a leak.

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::VisualizerConfig;
use crate::error::EngineError;
use crate::graph::AnalyserTap;

/// Number of amplitude bars per frame.
pub const NUM_BARS: usize = 24;

/// EMA smoothing factor (0.3 = 30% new value, 70% previous).
const EMA_ALPHA: f32 = 0.3;

/// One rendering frame.
#[derive(Debug, Clone, Serialize)]
pub struct VisualFrame {
    /// Normalized [0, 1] RMS per bar, oldest audio first.
    pub bars: [f32; NUM_BARS],
    /// Normalized FFT magnitudes, DC bin first.
    pub spectrum: Vec<f32>,
}

/// Rendering surface handle supplied by the embedding layer.
pub trait RenderSink: Send + Sync {
    fn render(&self, frame: &VisualFrame);
}

/// Sink that drops every frame. For embedders without a surface.
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&self, _frame: &VisualFrame) {}
}

struct EmaState {
    prev: [f32; NUM_BARS],
    initialized: bool,
}

impl EmaState {
    fn new() -> Self {
        Self {
            prev: [0.0; NUM_BARS],
            initialized: false,
        }
    }

    fn apply(&mut self, bars: &mut [f32; NUM_BARS]) {
        if !self.initialized {
            self.prev = *bars;
            self.initialized = true;
            return;
        }
        for (bar, prev) in bars.iter_mut().zip(self.prev.iter()) {
            *bar = EMA_ALPHA * *bar + (1.0 - EMA_ALPHA) * prev;
        }
        self.prev = *bars;
    }
}

/// Split the window into bars and compute normalized RMS per segment.
fn compute_bars(samples: &[f32]) -> [f32; NUM_BARS] {
    let mut bars = [0.0f32; NUM_BARS];
    if samples.is_empty() {
        return bars;
    }

    let per_bar = (samples.len() / NUM_BARS).max(1);
    for (index, bar) in bars.iter_mut().enumerate() {
        let start = index * per_bar;
        if start >= samples.len() {
            break;
        }
        let end = ((index + 1) * per_bar).min(samples.len());
        let segment = &samples[start..end];
        let sum: f32 = segment.iter().map(|s| s * s).sum();
        *bar = (sum / segment.len() as f32).sqrt().clamp(0.0, 1.0);
    }
    bars
}

struct SpectrumAnalyser {
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    output: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyser {
    fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            fft,
            input,
            output,
            scratch,
        }
    }

    /// Normalized magnitude per bin. Window length must equal the FFT size.
    fn magnitudes(&mut self, samples: &[f32]) -> Vec<f32> {
        let len = self.input.len();
        for (slot, sample) in self.input.iter_mut().zip(samples.iter()) {
            *slot = *sample;
        }
        for slot in self.input.iter_mut().skip(samples.len().min(len)) {
            *slot = 0.0;
        }

        if self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .is_err()
        {
            return vec![0.0; self.output.len()];
        }

        let scale = 2.0 / len as f32;
        self.output
            .iter()
            .map(|bin| (bin.norm() * scale).clamp(0.0, 1.0))
            .collect()
    }
}

/// Handle on the running frame loop.
pub struct Visualizer {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Visualizer {
    /// Attach to the analyser tap and start producing frames.
    pub fn spawn(tap: AnalyserTap, sink: Arc<dyn RenderSink>, config: &VisualizerConfig) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let period = Duration::from_millis(config.frame_interval_ms.max(1));
        let fft_size = config.fft_size.max(2);

        let task = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ema = EmaState::new();
            let mut spectrum = SpectrumAnalyser::new(fft_size);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tick.tick() => {
                        let window = tap.snapshot(fft_size);
                        let mut bars = compute_bars(&window);
                        ema.apply(&mut bars);
                        let frame = VisualFrame {
                            bars,
                            spectrum: spectrum.magnitudes(&window),
                        };
                        sink.render(&frame);
                    }
                }
            }
            debug!("Visualizer frame loop stopped");
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Halt the frame loop. Idempotent; called by teardown.
    pub async fn halt(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    "{}",
                    EngineError::Resource(format!("visualizer task failed: {e}"))
                );
            }
        }
    }
}
