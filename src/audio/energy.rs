// Energy: mean root-mean-square amplitude across centered frames.

use super::decoder::MonoAudio;
use super::spectrum::{centered_frame, centered_frame_count};

const FRAME_LENGTH: usize = 2048;
const HOP_LENGTH: usize = 512;

/// RMS amplitude of every centered frame.
pub fn rms_frames(samples: &[f32]) -> Vec<f64> {
    (0..centered_frame_count(samples.len(), HOP_LENGTH))
        .map(|t| {
            let frame = centered_frame(samples, t, FRAME_LENGTH, HOP_LENGTH);
            let mean_sq = frame.iter().map(|s| s * s).sum::<f64>() / FRAME_LENGTH as f64;
            mean_sq.sqrt()
        })
        .collect()
}

/// Mean RMS energy of the clip. Zero for empty input.
pub fn mean_energy(audio: &MonoAudio) -> f64 {
    let frames = rms_frames(&audio.samples);
    if frames.is_empty() {
        return 0.0;
    }
    frames.iter().sum::<f64>() / frames.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_energy() {
        let audio = MonoAudio::new(vec![0.0; 22050], 22050);
        assert_eq!(mean_energy(&audio), 0.0);
    }

    #[test]
    fn full_scale_square_wave_interior_frames_are_one() {
        let samples: Vec<f32> = (0..22050).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let frames = rms_frames(&samples);
        let mid = frames[frames.len() / 2];
        assert!((mid - 1.0).abs() < 1e-9);
    }

    #[test]
    fn louder_signal_has_more_energy() {
        let quiet = MonoAudio::new(vec![0.1; 22050], 22050);
        let loud = MonoAudio::new(vec![0.8; 22050], 22050);
        assert!(mean_energy(&loud) > mean_energy(&quiet));
    }
}
