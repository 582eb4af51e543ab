//! Capture constraint types passed to providers.

use serde::{Deserialize, Serialize};

/// Audio processing hints for a capture request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub channel_count: u16,
    pub sample_size: u16,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self::voice()
    }
}

impl AudioConstraints {
    /// Constraints for a speech microphone: cleanup filters on, mono.
    pub fn voice() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            channel_count: 1,
            sample_size: 16,
        }
    }

    /// Constraints for system audio: no cleanup, keep the stereo image.
    /// Filters tuned for speech distort music and remote voices.
    pub fn raw_system() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            channel_count: 2,
            sample_size: 16,
        }
    }
}

/// Video hints for a display capture request. Preview only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30,
        }
    }
}

/// Full constraint set for a capture request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub audio: AudioConstraints,
    pub video: Option<VideoConstraints>,
}

impl CaptureConstraints {
    /// Defaults for a microphone-only session.
    pub fn microphone() -> Self {
        Self {
            audio: AudioConstraints::voice(),
            video: None,
        }
    }

    /// Defaults for a display session: raw system audio plus preview video.
    pub fn display() -> Self {
        Self {
            audio: AudioConstraints::raw_system(),
            video: Some(VideoConstraints::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_constraints_filter_on() {
        let c = AudioConstraints::voice();
        assert!(c.echo_cancellation);
        assert!(c.noise_suppression);
        assert_eq!(c.channel_count, 1);
    }

    #[test]
    fn test_system_constraints_filter_off() {
        let c = AudioConstraints::raw_system();
        assert!(!c.echo_cancellation);
        assert!(!c.noise_suppression);
        assert!(!c.auto_gain_control);
        assert_eq!(c.channel_count, 2);
    }

    #[test]
    fn test_display_defaults_carry_video() {
        let c = CaptureConstraints::display();
        assert!(c.video.is_some());
        assert_eq!(c.video.unwrap().frame_rate, 30);
    }
}
