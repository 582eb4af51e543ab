//! The `record` command: drive a full session against real devices and
//! save the finished artifact.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::capture::{CaptureConstraints, CpalProvider, SourceKind};
use crate::config::{recordings_dir, Config};
use crate::encoder::OutputArtifact;
use crate::session::{EngineEvent, EventSender, RecordingMachine};
use crate::visualizer::{RenderSink, VisualFrame};

use super::args::RecordArgs;

/// Sink that folds each frame down to a peak level for trace logging.
struct LevelMeterSink;

impl RenderSink for LevelMeterSink {
    fn render(&self, frame: &VisualFrame) {
        let peak = frame.bars.iter().cloned().fold(0.0f32, f32::max);
        trace!("level {peak:.2}");
    }
}

pub async fn handle_record_command(args: RecordArgs) -> Result<()> {
    let kind = match args.source.as_str() {
        "mic" | "microphone" => SourceKind::Microphone,
        "screen" | "display" => SourceKind::Display,
        other => bail!("Unknown source {other:?} (expected \"mic\" or \"screen\")"),
    };
    let constraints = match kind {
        SourceKind::Microphone => CaptureConstraints::microphone(),
        SourceKind::Display => CaptureConstraints::display(),
    };

    let config = Config::load()?;
    let (events, mut rx) = EventSender::channel();
    let machine = RecordingMachine::new(
        Arc::new(CpalProvider::new()),
        config,
        Arc::new(LevelMeterSink),
        events,
    );

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::StateChanged {
                    phase,
                    elapsed_seconds,
                } => debug!("state: {} ({}s)", phase.as_str(), elapsed_seconds),
                EngineEvent::Stopped { artifact } => {
                    info!("artifact ready: {} bytes", artifact.size_bytes)
                }
                EngineEvent::Error { kind, message } => error!("engine error {kind:?}: {message}"),
            }
        }
    });

    let outcome = machine.start(kind, constraints).await?;
    info!("Recording session {}", outcome.session_id);
    if outcome.video_preview.is_some() {
        info!("Display video is preview-only and will not be encoded");
    }

    match args.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            info!("Press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    let artifact = machine.stop().await?;
    let path = resolve_output_path(args.output)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_artifact(&path, &artifact)?;
    info!(
        "Recording saved: {:?} ({} bytes, {})",
        path, artifact.size_bytes, artifact.mime_type
    );
    Ok(())
}

fn resolve_output_path(requested: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = requested {
        return Ok(path);
    }

    let dir = recordings_dir()?;
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("recording-{timestamp}.wav"));
    if !path.exists() {
        return Ok(path);
    }
    // Collision with a same-second recording: append a counter.
    for i in 1..100 {
        let alt = dir.join(format!("recording-{timestamp}-{i}.wav"));
        if !alt.exists() {
            return Ok(alt);
        }
    }
    Ok(path)
}

/// Extract the PCM payload and rate from a known container.
fn pcm_payload(artifact: &OutputArtifact) -> Option<(&[u8], u32)> {
    if artifact.mime_type == "audio/wav" {
        let header = artifact.bytes.get(..44)?;
        let rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
        return Some((artifact.bytes.get(44..)?, rate));
    }
    if artifact.mime_type.starts_with("audio/L16") {
        let rate = artifact
            .mime_type
            .split(';')
            .find_map(|part| part.trim().strip_prefix("rate="))
            .and_then(|value| value.parse().ok())?;
        return Some((&artifact.bytes, rate));
    }
    None
}

/// Save the artifact. Known containers are rewritten through hound so the
/// on-disk file carries a finite header instead of the live-stream one;
/// anything else is written verbatim.
fn write_artifact(path: &Path, artifact: &OutputArtifact) -> Result<()> {
    let Some((payload, sample_rate)) = pcm_payload(artifact) else {
        warn!(
            "Unknown container {}, writing bytes as-is",
            artifact.mime_type
        );
        std::fs::write(path, &artifact.bytes)?;
        return Ok(());
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for bytes in payload.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([bytes[0], bytes[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_artifact() -> OutputArtifact {
        use crate::encoder::{ChunkEncoder, WavStreamEncoder};
        let mut encoder = WavStreamEncoder::new(16_000);
        let bytes = encoder.encode_block(&[0.25; 64]);
        OutputArtifact {
            size_bytes: bytes.len(),
            bytes,
            mime_type: "audio/wav".to_string(),
        }
    }

    #[test]
    fn test_pcm_payload_from_wav() {
        let artifact = wav_artifact();
        let (payload, rate) = pcm_payload(&artifact).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(payload.len(), 128);
    }

    #[test]
    fn test_pcm_payload_from_l16_mime() {
        let artifact = OutputArtifact {
            bytes: vec![0u8; 32],
            mime_type: "audio/L16;rate=8000;channels=1".to_string(),
            size_bytes: 32,
        };
        let (payload, rate) = pcm_payload(&artifact).unwrap();
        assert_eq!(rate, 8_000);
        assert_eq!(payload.len(), 32);
    }

    #[test]
    fn test_write_artifact_produces_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_artifact(&path, &wav_artifact()).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 64);
    }
}
