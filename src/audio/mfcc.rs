// Mel-frequency cepstral coefficients, used as the genre classifier's input vector.

use std::f64::consts::PI;

use super::decoder::MonoAudio;
use super::spectrum::{mel_spectrogram, power_to_db};

/// Number of coefficients the genre model expects.
pub const N_MFCC: usize = 40;

const N_FFT: usize = 2048;
const HOP_LENGTH: usize = 512;
const N_MELS: usize = 128;
const TOP_DB: f64 = 80.0;

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients.
fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// MFCC matrix, one row of `n_mfcc` coefficients per frame.
pub fn mfcc(audio: &MonoAudio, n_mfcc: usize) -> Vec<Vec<f64>> {
    let mel = mel_spectrogram(&audio.samples, audio.sample_rate, N_FFT, HOP_LENGTH, N_MELS);
    power_to_db(&mel, TOP_DB)
        .iter()
        .map(|frame| dct_ortho(frame, n_mfcc))
        .collect()
}

/// Time-averaged MFCC vector of length [`N_MFCC`]. All zeros for empty input.
pub fn mean_mfcc(audio: &MonoAudio) -> Vec<f32> {
    let frames = mfcc(audio, N_MFCC);
    let mut mean = vec![0.0f64; N_MFCC];
    if frames.is_empty() {
        return vec![0.0; N_MFCC];
    }
    for frame in &frames {
        for (m, c) in mean.iter_mut().zip(frame) {
            *m += c;
        }
    }
    mean.iter().map(|m| (m / frames.len() as f64) as f32).collect()
}
