//! Real capture backend via cpal.
//!
//! Microphone capture uses the default input device. Display capture records
//! system audio through a PipeWire/PulseAudio monitor source, which exposes
//! the machine's output (what others say on Zoom/Meet/etc.) as an input
//! device. No video track is produced here; preview requires a compositor
//! integration this backend does not carry.
//!
//! Each stream lives on its own capture thread so acquired sources stay
//! `Send`; the thread parks until the track is stopped, then drops the
//! stream.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info};

use crate::error::EngineError;

use super::constraints::{AudioConstraints, CaptureConstraints};
use super::provider::CaptureProvider;
use super::source::{AudioTrack, CaptureSource, SourceKind};

pub struct CpalProvider;

impl CpalProvider {
    pub fn new() -> Self {
        Self
    }

    /// Find a PipeWire/PulseAudio monitor source.
    fn find_monitor_device() -> Result<Option<(cpal::Device, String)>, EngineError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| EngineError::Unsupported(format!("cannot enumerate capture devices: {e}")))?;

        for device in devices {
            if let Ok(name) = device.name() {
                if name.to_lowercase().contains("monitor") {
                    info!("Found system audio monitor: {name}");
                    return Ok(Some((device, name)));
                }
            }
        }
        Ok(None)
    }
}

impl Default for CpalProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of all input devices, with monitor sources flagged. Diagnostics.
pub fn list_input_devices() -> Result<Vec<(String, bool)>, EngineError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| EngineError::Unsupported(format!("cannot enumerate capture devices: {e}")))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| {
            let monitor = name.to_lowercase().contains("monitor");
            (name, monitor)
        })
        .collect())
}

/// Average interleaved frames down to mono.
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Build a live audio track on a dedicated capture thread.
///
/// Blocks until the stream is playing or setup failed, so acquisition
/// errors surface to the caller instead of dying on the thread.
fn build_track(device: cpal::Device, label: String) -> Result<AudioTrack, EngineError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    // The device's real sample rate is only known after the handshake;
    // the track starts at 0 and is patched once the stream is playing.
    let mut track = AudioTrack::new(label, 0);
    let thread_writer = track.writer();
    thread::spawn(move || {
        let default_config = match device.default_input_config() {
            Ok(c) => c,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("no usable input config: {e}")));
                return;
            }
        };
        let sample_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as usize;
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let cb_writer = thread_writer.clone();
        let err_writer = thread_writer.clone();
        let stream = match device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if channels <= 1 {
                    cb_writer.push(data);
                } else {
                    cb_writer.push(&downmix_to_mono(data, channels));
                }
            },
            move |err| {
                error!("Capture stream error: {err}");
                err_writer.end();
            },
            None,
        ) {
            Ok(s) => s,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("failed to build input stream: {e}")));
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(format!("failed to start input stream: {e}")));
            return;
        }
        let _ = ready_tx.send(Ok(sample_rate));

        // Park until the session stops the track, then drop the stream.
        let _ = stop_rx.recv();
        drop(stream);
        thread_writer.end();
        debug!("Capture thread exited");
    });

    match ready_rx.recv() {
        Ok(Ok(sample_rate)) => {
            track.set_sample_rate(sample_rate);
            Ok(track.with_stopper(move || {
                let _ = stop_tx.send(());
            }))
        }
        Ok(Err(msg)) => Err(EngineError::Permission(msg)),
        Err(_) => Err(EngineError::Permission(
            "capture thread died during setup".to_string(),
        )),
    }
}

#[async_trait]
impl CaptureProvider for CpalProvider {
    async fn request_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<CaptureSource, EngineError> {
        debug!(
            "Microphone request (echo_cancellation={}, noise_suppression={}); cpal applies device defaults",
            constraints.echo_cancellation, constraints.noise_suppression
        );

        tokio::task::spawn_blocking(move || {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| EngineError::Permission("no input device available".to_string()))?;
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            info!("Microphone capture using device: {name}");

            let track = build_track(device, name)?;
            let mut source = CaptureSource::new(SourceKind::Microphone);
            source.audio_tracks.push(track);
            Ok(source)
        })
        .await
        .map_err(|e| EngineError::Unsupported(format!("capture task failed: {e}")))?
    }

    async fn request_display(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<CaptureSource, EngineError> {
        tokio::task::spawn_blocking(move || {
            let mut source = CaptureSource::new(SourceKind::Display);

            // A missing monitor means the platform granted no system audio;
            // the acquisition layer turns that into the explicit failure.
            if let Some((device, name)) = Self::find_monitor_device()? {
                let track = build_track(device, name)?;
                source.audio_tracks.push(track);
            }
            Ok(source)
        })
        .await
        .map_err(|e| EngineError::Unsupported(format!("capture task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let stereo = [0.2, 0.8, 0.4, 0.6];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }
}
