//! Capture sources and their tracks.
//!
//! A source is a live hardware-backed feed owned by exactly one session.
//! Audio tracks carry a sample feed written by a capture backend and drained
//! by the routing graph; video tracks are opaque preview handles that are
//! never routed to the encoder.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Kind of capture a session was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Microphone,
    Display,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::Display => "display",
        }
    }
}

type Stopper = Box<dyn FnOnce() + Send>;

/// A live audio track: a sample feed plus enabled/live flags.
pub struct AudioTrack {
    id: Uuid,
    label: String,
    sample_rate: u32,
    feed: Arc<Mutex<Vec<f32>>>,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    stopper: Option<Stopper>,
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("sample_rate", &self.sample_rate)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .field("has_stopper", &self.stopper.is_some())
            .finish()
    }
}

impl AudioTrack {
    pub fn new(label: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            sample_rate,
            feed: Arc::new(Mutex::new(Vec::new())),
            enabled: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicBool::new(true)),
            stopper: None,
        }
    }

    /// Attach the hook that releases the underlying hardware stream.
    pub fn with_stopper(mut self, stopper: impl FnOnce() + Send + 'static) -> Self {
        self.stopper = Some(Box::new(stopper));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Patch the rate once a backend learns the device's real one.
    pub(crate) fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Producer-side handle for the capture backend.
    pub fn writer(&self) -> TrackWriter {
        TrackWriter {
            feed: self.feed.clone(),
            live: self.live.clone(),
        }
    }

    /// Consumer-side view for the routing graph.
    pub fn tap(&self) -> TrackTap {
        TrackTap {
            track_id: self.id,
            sample_rate: self.sample_rate,
            feed: self.feed.clone(),
            enabled: self.enabled.clone(),
            live: self.live.clone(),
        }
    }

    /// Stop the track: mark it dead and release the hardware stream.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(stopper) = self.stopper.take() {
            debug!("Stopping audio track {}", self.label);
            stopper();
        }
    }
}

impl Drop for AudioTrack {
    fn drop(&mut self) {
        if self.stopper.is_some() {
            debug!("Dropping live audio track {}, cleaning up", self.label);
            self.stop();
        }
    }
}

/// Producer side of an audio track, held by capture backends.
#[derive(Clone)]
pub struct TrackWriter {
    feed: Arc<Mutex<Vec<f32>>>,
    live: Arc<AtomicBool>,
}

impl TrackWriter {
    pub fn push(&self, samples: &[f32]) {
        if !self.is_live() {
            return;
        }
        if let Ok(mut feed) = self.feed.lock() {
            feed.extend_from_slice(samples);
        }
    }

    /// Mark the track as ended by the platform (device unplugged, share
    /// revoked). The graph notices and the session degrades gracefully.
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Consumer side of an audio track, held by the routing graph.
#[derive(Clone)]
pub struct TrackTap {
    track_id: Uuid,
    sample_rate: u32,
    feed: Arc<Mutex<Vec<f32>>>,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
}

impl TrackTap {
    pub fn track_id(&self) -> Uuid {
        self.track_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Take everything the backend pushed since the last drain.
    pub fn drain(&self) -> Vec<f32> {
        self.feed
            .lock()
            .map(|mut feed| std::mem::take(&mut *feed))
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// A live video track. Preview only; never encoded.
pub struct VideoTrack {
    id: Uuid,
    label: String,
    width: u32,
    height: u32,
    frame_rate: u32,
    live: Arc<AtomicBool>,
    stopper: Option<Stopper>,
}

impl std::fmt::Debug for VideoTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_rate", &self.frame_rate)
            .field("live", &self.is_live())
            .field("has_stopper", &self.stopper.is_some())
            .finish()
    }
}

impl VideoTrack {
    pub fn new(label: impl Into<String>, width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            width,
            height,
            frame_rate,
            live: Arc::new(AtomicBool::new(true)),
            stopper: None,
        }
    }

    pub fn with_stopper(mut self, stopper: impl FnOnce() + Send + 'static) -> Self {
        self.stopper = Some(Box::new(stopper));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Read-only preview handle handed to the embedding layer.
    pub fn preview(&self) -> VideoPreview {
        VideoPreview {
            track_id: self.id,
            label: self.label.clone(),
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            live: self.live.clone(),
        }
    }

    pub fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(stopper) = self.stopper.take() {
            debug!("Stopping video track {}", self.label);
            stopper();
        }
    }
}

impl Drop for VideoTrack {
    fn drop(&mut self) {
        if self.stopper.is_some() {
            self.stop();
        }
    }
}

/// Read-only view of a video track for live preview rendering.
#[derive(Clone, Debug)]
pub struct VideoPreview {
    pub track_id: Uuid,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    live: Arc<AtomicBool>,
}

impl VideoPreview {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// A capture source: the tracks one acquisition request granted.
#[derive(Debug)]
pub struct CaptureSource {
    pub kind: SourceKind,
    pub audio_tracks: Vec<AudioTrack>,
    pub video_tracks: Vec<VideoTrack>,
}

impl CaptureSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            audio_tracks: Vec::new(),
            video_tracks: Vec::new(),
        }
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_tracks.is_empty()
    }

    /// Flip the enabled flag on every audio track. Topology untouched.
    pub fn set_audio_enabled(&self, enabled: bool) {
        for track in &self.audio_tracks {
            track.set_enabled(enabled);
        }
    }

    pub fn preview(&self) -> Option<VideoPreview> {
        self.video_tracks.first().map(VideoTrack::preview)
    }

    /// Stop every track on this source. Safe to call more than once.
    pub fn stop_all(&mut self) {
        for track in &mut self.audio_tracks {
            track.stop();
        }
        for track in &mut self.video_tracks {
            track.stop();
        }
    }
}
