//! Container formats and negotiation.
//!
//! Chunks from a live session must concatenate into one playable artifact,
//! so every container here is streamable: the WAV encoder writes its RIFF
//! framing with unknown-size markers (the streaming convention, sizes read
//! to end of file) and raw PCM has no framing at all.

use tracing::{debug, warn};

/// Incremental encoder for the mixed stream.
///
/// `encode_block` turns a block of mono f32 samples into chunk bytes; any
/// container framing rides along with the first non-empty block.
pub trait ChunkEncoder: Send {
    fn mime_type(&self) -> &str;
    fn encode_block(&mut self, samples: &[f32]) -> Vec<u8>;
}

/// Unknown-size marker used by streaming RIFF writers.
const STREAMING_SIZE: u32 = 0xFFFF_FFFF;

const BIT_DEPTH: u16 = 16;
const CHANNELS: u16 = 1;

/// Convert f32 samples in [-1.0, 1.0] to little-endian 16-bit PCM.
fn samples_to_s16le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Streaming WAV: a 44-byte RIFF header on the first non-empty block,
/// s16le payload afterwards.
pub struct WavStreamEncoder {
    sample_rate: u32,
    header_written: bool,
}

impl WavStreamEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            header_written: false,
        }
    }

    fn header(&self) -> [u8; 44] {
        let byte_rate = self.sample_rate * CHANNELS as u32 * BIT_DEPTH as u32 / 8;
        let block_align = CHANNELS * BIT_DEPTH / 8;

        let mut header = [0u8; 44];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&STREAMING_SIZE.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes());
        header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&block_align.to_le_bytes());
        header[34..36].copy_from_slice(&BIT_DEPTH.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&STREAMING_SIZE.to_le_bytes());
        header
    }
}

impl ChunkEncoder for WavStreamEncoder {
    fn mime_type(&self) -> &str {
        "audio/wav"
    }

    fn encode_block(&mut self, samples: &[f32]) -> Vec<u8> {
        if samples.is_empty() {
            return Vec::new();
        }
        let payload = samples_to_s16le(samples);
        if self.header_written {
            return payload;
        }
        self.header_written = true;
        let mut bytes = Vec::with_capacity(44 + payload.len());
        bytes.extend_from_slice(&self.header());
        bytes.extend_from_slice(&payload);
        bytes
    }
}

/// Raw s16le PCM, no framing. The platform default.
pub struct PcmEncoder {
    mime: String,
}

impl PcmEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            mime: format!("audio/L16;rate={sample_rate};channels={CHANNELS}"),
        }
    }
}

impl ChunkEncoder for PcmEncoder {
    fn mime_type(&self) -> &str {
        &self.mime
    }

    fn encode_block(&mut self, samples: &[f32]) -> Vec<u8> {
        samples_to_s16le(samples)
    }
}

/// Walk the preference list and pick the first supported container. When
/// nothing matches, fall back to raw PCM and let the artifact report what
/// the chunks actually carry.
pub fn negotiate(preferences: &[String], sample_rate: u32) -> Box<dyn ChunkEncoder> {
    for preference in preferences {
        let wanted = preference.trim();
        if wanted.eq_ignore_ascii_case("audio/wav") {
            debug!("Negotiated container: audio/wav");
            return Box::new(WavStreamEncoder::new(sample_rate));
        }
        if wanted.to_ascii_lowercase().starts_with("audio/l16") {
            debug!("Negotiated container: {wanted}");
            return Box::new(PcmEncoder::new(sample_rate));
        }
        debug!("Container {wanted} not supported, trying next");
    }

    warn!("No preferred container supported, using platform default");
    Box::new(PcmEncoder::new(sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16le_conversion_clamps() {
        let bytes = samples_to_s16le(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 0);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
        // Clamped overdrive equals full scale.
        assert_eq!(
            i16::from_le_bytes([bytes[6], bytes[7]]),
            i16::from_le_bytes([bytes[2], bytes[3]])
        );
    }

    #[test]
    fn test_wav_header_on_first_block_only() {
        let mut encoder = WavStreamEncoder::new(16_000);
        let first = encoder.encode_block(&[0.1; 10]);
        let second = encoder.encode_block(&[0.1; 10]);

        assert_eq!(first.len(), 44 + 20);
        assert_eq!(&first[0..4], b"RIFF");
        assert_eq!(&first[8..12], b"WAVE");
        assert_eq!(&first[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes([first[24], first[25], first[26], first[27]]),
            16_000
        );
        assert_eq!(second.len(), 20);
        assert_ne!(&second[0..4], b"RIFF");
    }

    #[test]
    fn test_wav_empty_block_emits_nothing() {
        let mut encoder = WavStreamEncoder::new(16_000);
        assert!(encoder.encode_block(&[]).is_empty());
        // Header still belongs to the first real block.
        let first = encoder.encode_block(&[0.1]);
        assert_eq!(&first[0..4], b"RIFF");
    }

    #[test]
    fn test_negotiation_prefers_first_supported() {
        let encoder = negotiate(
            &["audio/wav".to_string(), "audio/L16".to_string()],
            16_000,
        );
        assert_eq!(encoder.mime_type(), "audio/wav");
    }

    #[test]
    fn test_negotiation_skips_unknown() {
        let encoder = negotiate(
            &["audio/webm".to_string(), "audio/L16".to_string()],
            16_000,
        );
        assert!(encoder.mime_type().starts_with("audio/L16"));
    }

    #[test]
    fn test_negotiation_falls_back_to_default() {
        let encoder = negotiate(&["audio/webm".to_string()], 8_000);
        assert_eq!(encoder.mime_type(), "audio/L16;rate=8000;channels=1");
    }
}
