//! Pure mixing and resampling math for the mix bus.
//!
//! No state, no side effects.

/// Mix per-source blocks (all at the same rate) into one mono block.
///
/// Shorter blocks are zero-padded. The sum is averaged across contributing
/// sources and normalized if it still exceeds [-1.0, 1.0].
pub fn mix(blocks: &[Vec<f32>]) -> Vec<f32> {
    let non_empty: Vec<&Vec<f32>> = blocks.iter().filter(|b| !b.is_empty()).collect();
    if non_empty.is_empty() {
        return Vec::new();
    }
    if non_empty.len() == 1 {
        return non_empty[0].clone();
    }

    let max_len = non_empty.iter().map(|b| b.len()).max().unwrap_or(0);
    let scale = 1.0 / non_empty.len() as f32;

    let mut mixed = vec![0.0f32; max_len];
    for block in &non_empty {
        for (out, &sample) in mixed.iter_mut().zip(block.iter()) {
            *out += sample;
        }
    }
    for sample in &mut mixed {
        *sample *= scale;
    }

    let peak = mixed.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 1.0 {
        for sample in &mut mixed {
            *sample /= peak;
        }
    }

    mixed
}

/// Linear-interpolation resampling. Good enough for speech.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio).ceil() as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let sample = if src_idx + 1 < samples.len() {
            samples[src_idx] as f64 * (1.0 - frac) + samples[src_idx + 1] as f64 * frac
        } else if src_idx < samples.len() {
            samples[src_idx] as f64
        } else {
            0.0
        };
        resampled.push(sample as f32);
    }

    resampled
}

/// Scale a block in place.
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in samples {
        *sample *= gain;
    }
}

/// Root-mean-square level of a block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_empty() {
        assert!(mix(&[]).is_empty());
        assert!(mix(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_mix_single_block_passthrough() {
        let block = vec![0.5, -0.3, 0.1];
        assert_eq!(mix(&[block.clone()]), block);
    }

    #[test]
    fn test_mix_averages_equal_blocks() {
        let mixed = mix(&[vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert_eq!(mixed, vec![0.5, 0.5]);
    }

    #[test]
    fn test_mix_zero_pads_shorter_block() {
        let mixed = mix(&[vec![1.0, 1.0], vec![1.0, 1.0, 1.0, 1.0]]);
        assert_eq!(mixed.len(), 4);
        assert_eq!(mixed[0], 1.0);
        assert_eq!(mixed[2], 0.5);
    }

    #[test]
    fn test_mix_stays_in_range() {
        let mixed = mix(&[vec![1.0; 8], vec![1.0; 8], vec![1.0; 8]]);
        for s in &mixed {
            assert!(*s <= 1.0 && *s >= -1.0);
        }
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_downsamples_3_to_1() {
        let samples: Vec<f32> = (0..48).map(|i| i as f32).collect();
        assert_eq!(resample(&samples, 48_000, 16_000).len(), 16);
    }

    #[test]
    fn test_apply_gain_halves() {
        let mut samples = vec![0.8, -0.4];
        apply_gain(&mut samples, 0.5);
        assert!((samples[0] - 0.4).abs() < 1e-6);
        assert!((samples[1] + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_constant_block() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }
}
