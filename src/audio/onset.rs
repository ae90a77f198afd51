// Onset strength envelope (used as the "danceability" proxy).
//
// Positive spectral flux of a log-power mel spectrogram:
//   onset[t] = mean over bands of max(0, S_db[t][b] - S_db[t-1][b])
// The first frame has no predecessor and contributes 0.

use super::decoder::MonoAudio;
use super::spectrum::{mel_spectrogram, power_to_db};

const N_FFT: usize = 2048;
const HOP_LENGTH: usize = 512;
const N_MELS: usize = 128;
const TOP_DB: f64 = 80.0;

/// Onset strength for every frame.
pub fn onset_strength(audio: &MonoAudio) -> Vec<f64> {
    let mel = mel_spectrogram(&audio.samples, audio.sample_rate, N_FFT, HOP_LENGTH, N_MELS);
    let db = power_to_db(&mel, TOP_DB);
    if db.is_empty() {
        return Vec::new();
    }

    let mut envelope = Vec::with_capacity(db.len());
    envelope.push(0.0);
    for pair in db.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let flux: f64 = cur
            .iter()
            .zip(prev)
            .map(|(c, p)| (c - p).max(0.0))
            .sum::<f64>()
            / N_MELS as f64;
        envelope.push(flux);
    }
    envelope
}

/// Mean of the onset strength envelope. Zero for empty input.
pub fn mean_onset_strength(audio: &MonoAudio) -> f64 {
    let envelope = onset_strength(audio);
    if envelope.is_empty() {
        return 0.0;
    }
    envelope.iter().sum::<f64>() / envelope.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn click_track(bpm: f64, sample_rate: u32, seconds: f64) -> MonoAudio {
        let total = (sample_rate as f64 * seconds) as usize;
        let mut samples = vec![0.0f32; total];
        let step = (60.0 / bpm * sample_rate as f64) as usize;
        let click = (sample_rate as f64 * 0.01) as usize;
        let mut pos = 0;
        while pos < total {
            for j in 0..click.min(total - pos) {
                let t = j as f32 / sample_rate as f32;
                samples[pos + j] = (2.0 * PI * 1000.0 * t).sin() * (-t * 300.0).exp();
            }
            pos += step;
        }
        MonoAudio::new(samples, sample_rate)
    }

    #[test]
    fn envelope_has_one_value_per_frame() {
        let audio = MonoAudio::new(vec![0.0; 22050], 22050);
        assert_eq!(onset_strength(&audio).len(), 1 + 22050 / HOP_LENGTH);
    }

    #[test]
    fn silence_has_no_onsets() {
        let audio = MonoAudio::new(vec![0.0; 22050 * 2], 22050);
        assert_eq!(mean_onset_strength(&audio), 0.0);
    }

    #[test]
    fn clicks_are_stronger_than_steady_tone() {
        let clicks = click_track(120.0, 22050, 5.0);
        let tone: Vec<f32> = (0..22050 * 5)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 22050.0).sin())
            .collect();
        let tone = MonoAudio::new(tone, 22050);
        assert!(mean_onset_strength(&clicks) > mean_onset_strength(&tone));
    }

    #[test]
    fn onset_strength_is_non_negative() {
        let clicks = click_track(100.0, 22050, 3.0);
        assert!(onset_strength(&clicks).iter().all(|&v| v >= 0.0));
    }
}
