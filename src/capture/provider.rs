//! Capture provider seam and the acquisition policy built on top of it.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::EngineError;

use super::constraints::{AudioConstraints, CaptureConstraints};
use super::source::{CaptureSource, SourceKind};

/// Backend that turns capture requests into live sources.
///
/// Acquisition awaits the platform's permission grant, so both requests are
/// async. A denial or an aborted picker both surface as
/// [`EngineError::Permission`].
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Request a microphone source with one audio track.
    async fn request_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<CaptureSource, EngineError>;

    /// Request a display source: whatever audio/video tracks the platform
    /// granted. Audio validation happens in [`acquire_sources`], not here.
    async fn request_display(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureSource, EngineError>;
}

/// Sources acquired for one session.
#[derive(Debug)]
pub struct AcquiredSources {
    pub primary: CaptureSource,
    pub secondary: Option<CaptureSource>,
}

impl AcquiredSources {
    /// Stop every track on every source.
    pub fn stop_all(&mut self) {
        self.primary.stop_all();
        if let Some(secondary) = &mut self.secondary {
            secondary.stop_all();
        }
    }
}

/// Acquire the sources for a session of the given kind.
///
/// Microphone sessions get a single source. Display sessions must carry
/// system audio: a video-only grant is rejected before any secondary
/// acquisition is attempted, because silently recording video-only would
/// satisfy the request and still lose the meeting. After validation a
/// microphone is tried as a secondary contribution; failure there is
/// non-fatal so that system-audio-only recording keeps working.
pub async fn acquire_sources(
    provider: &dyn CaptureProvider,
    kind: SourceKind,
    constraints: &CaptureConstraints,
) -> Result<AcquiredSources, EngineError> {
    match kind {
        SourceKind::Microphone => {
            let primary = provider.request_microphone(&constraints.audio).await?;
            info!("Acquired microphone source");
            Ok(AcquiredSources {
                primary,
                secondary: None,
            })
        }
        SourceKind::Display => {
            let mut primary = provider.request_display(constraints).await?;
            if !primary.has_audio() {
                primary.stop_all();
                return Err(EngineError::MissingAudioTrack);
            }

            let secondary = match provider
                .request_microphone(&AudioConstraints::voice())
                .await
            {
                Ok(source) => Some(source),
                Err(e) => {
                    warn!("Could not access mic, recording system audio only: {e}");
                    None
                }
            };

            info!(
                "Acquired display source (mic secondary: {})",
                secondary.is_some()
            );
            Ok(AcquiredSources { primary, secondary })
        }
    }
}
