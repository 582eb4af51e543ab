//! Scripted in-memory capture backend.
//!
//! Drives the engine without hardware: tests and embedders script what each
//! request grants, then feed samples into the granted tracks by hand.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::EngineError;

use super::constraints::{AudioConstraints, CaptureConstraints};
use super::provider::CaptureProvider;
use super::source::{AudioTrack, CaptureSource, SourceKind, TrackWriter, VideoTrack};

/// What a scripted request should grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Grant the full source (display grants audio + video).
    Grant,
    /// Display only: grant video but no audio track.
    GrantWithoutAudio,
    /// Deny the request, as a user dismissing the permission prompt.
    Deny,
}

struct Inner {
    sample_rate: u32,
    microphone: Script,
    display: Script,
    microphone_requests: u32,
    display_requests: u32,
    microphone_writers: Vec<TrackWriter>,
    system_writers: Vec<TrackWriter>,
}

/// Scripted capture provider.
#[derive(Clone)]
pub struct SyntheticProvider {
    inner: Arc<Mutex<Inner>>,
}

impl SyntheticProvider {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sample_rate,
                microphone: Script::Grant,
                display: Script::Grant,
                microphone_requests: 0,
                display_requests: 0,
                microphone_writers: Vec::new(),
                system_writers: Vec::new(),
            })),
        }
    }

    pub fn deny_microphone(self) -> Self {
        self.inner.lock().unwrap().microphone = Script::Deny;
        self
    }

    pub fn deny_display(self) -> Self {
        self.inner.lock().unwrap().display = Script::Deny;
        self
    }

    /// Script a display grant where the user forgot to share system audio.
    pub fn display_without_audio(self) -> Self {
        self.inner.lock().unwrap().display = Script::GrantWithoutAudio;
        self
    }

    pub fn microphone_request_count(&self) -> u32 {
        self.inner.lock().unwrap().microphone_requests
    }

    pub fn display_request_count(&self) -> u32 {
        self.inner.lock().unwrap().display_requests
    }

    /// Push samples into every granted microphone track.
    pub fn feed_microphone(&self, samples: &[f32]) {
        for writer in &self.inner.lock().unwrap().microphone_writers {
            writer.push(samples);
        }
    }

    /// Push samples into every granted system-audio track.
    pub fn feed_system(&self, samples: &[f32]) {
        for writer in &self.inner.lock().unwrap().system_writers {
            writer.push(samples);
        }
    }

    /// Mark every granted track as ended, as if the platform revoked them.
    pub fn end_all_tracks(&self) {
        let inner = self.inner.lock().unwrap();
        for writer in inner
            .microphone_writers
            .iter()
            .chain(inner.system_writers.iter())
        {
            writer.end();
        }
    }
}

#[async_trait]
impl CaptureProvider for SyntheticProvider {
    async fn request_microphone(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<CaptureSource, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.microphone_requests += 1;

        match inner.microphone {
            Script::Deny => Err(EngineError::Permission(
                "microphone denied by user".to_string(),
            )),
            _ => {
                let track = AudioTrack::new("synthetic-mic", inner.sample_rate);
                inner.microphone_writers.push(track.writer());
                let mut source = CaptureSource::new(SourceKind::Microphone);
                source.audio_tracks.push(track);
                Ok(source)
            }
        }
    }

    async fn request_display(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureSource, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.display_requests += 1;

        let script = inner.display;
        if script == Script::Deny {
            return Err(EngineError::Permission(
                "screen share cancelled by user".to_string(),
            ));
        }

        let mut source = CaptureSource::new(SourceKind::Display);
        if let Some(video) = &constraints.video {
            source.video_tracks.push(VideoTrack::new(
                "synthetic-screen",
                video.width,
                video.height,
                video.frame_rate,
            ));
        }
        if script == Script::Grant {
            let track = AudioTrack::new("synthetic-system-audio", inner.sample_rate);
            inner.system_writers.push(track.writer());
            source.audio_tracks.push(track);
        }
        Ok(source)
    }
}
