// Short-time Fourier transform and mel filterbank shared by the feature extractors.
//
// Frames are centered: the signal is zero-padded by half a window on each side,
// so frame `t` is centered on sample `t * hop`. This gives `1 + len / hop` frames,
// which keeps the RMS, onset and MFCC envelopes aligned with each other.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos()))
        .collect()
}

/// Number of centered frames for a signal of `len` samples.
pub fn centered_frame_count(len: usize, hop: usize) -> usize {
    if len == 0 {
        0
    } else {
        1 + len / hop
    }
}

/// Samples of centered frame `index`, zero-filled where it overhangs the signal.
pub fn centered_frame(samples: &[f32], index: usize, frame_len: usize, hop: usize) -> Vec<f64> {
    let half = (frame_len / 2) as isize;
    let start = (index * hop) as isize - half;
    (0..frame_len as isize)
        .map(|i| {
            let pos = start + i;
            if pos < 0 || pos as usize >= samples.len() {
                0.0
            } else {
                samples[pos as usize] as f64
            }
        })
        .collect()
}

/// Power spectrogram, one row of `n_fft / 2 + 1` bins per centered frame.
pub fn power_spectrogram(samples: &[f32], n_fft: usize, hop: usize) -> Vec<Vec<f64>> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let n_bins = n_fft / 2 + 1;

    (0..centered_frame_count(samples.len(), hop))
        .map(|t| {
            let mut buffer: Vec<Complex<f64>> = centered_frame(samples, t, n_fft, hop)
                .iter()
                .zip(&window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer[..n_bins].iter().map(|c| c.norm_sqr()).collect()
        })
        .collect()
}

/// Slaney mel scale: linear below 1kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = (6.4f64).ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = (6.4f64).ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank with area normalization, `n_mels` rows of `n_fft / 2 + 1` weights.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let fmax = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(fmax);

    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();
    let bin_freqs: Vec<f64> = (0..n_bins)
        .map(|b| b as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (upper - lower);
            bin_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Apply a filterbank to every frame of a power spectrogram.
pub fn apply_filterbank(power: &[Vec<f64>], filterbank: &[Vec<f64>]) -> Vec<Vec<f64>> {
    power
        .iter()
        .map(|frame| {
            filterbank
                .iter()
                .map(|weights| weights.iter().zip(frame).map(|(w, p)| w * p).sum())
                .collect()
        })
        .collect()
}

/// Mel power spectrogram, one row of `n_mels` bands per frame.
pub fn mel_spectrogram(
    samples: &[f32],
    sample_rate: u32,
    n_fft: usize,
    hop: usize,
    n_mels: usize,
) -> Vec<Vec<f64>> {
    let power = power_spectrogram(samples, n_fft, hop);
    let filterbank = mel_filterbank(sample_rate, n_fft, n_mels);
    apply_filterbank(&power, &filterbank)
}

/// Convert power values to decibels (reference 1.0), floored at `max - top_db`
/// across the whole spectrogram.
pub fn power_to_db(spec: &[Vec<f64>], top_db: f64) -> Vec<Vec<f64>> {
    const AMIN: f64 = 1e-10;
    let mut db: Vec<Vec<f64>> = spec
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();
    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() {
        let floor = peak - top_db;
        for v in db.iter_mut().flatten() {
            *v = v.max(floor);
        }
    }
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [50.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn centered_frames_cover_signal() {
        assert_eq!(centered_frame_count(0, 512), 0);
        assert_eq!(centered_frame_count(2048, 512), 5);
        let frame = centered_frame(&[1.0; 10], 0, 8, 4);
        assert_eq!(&frame[..4], &[0.0; 4]);
        assert_eq!(&frame[4..], &[1.0; 4]);
    }

    #[test]
    fn pure_tone_peaks_at_expected_bin() {
        let sr = 22050;
        let n_fft = 2048;
        let freq = 43.0 * sr as f64 / n_fft as f64;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin() as f32)
            .collect();
        let power = power_spectrogram(&samples, n_fft, 512);
        let mid = &power[power.len() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 43);
    }

    #[test]
    fn filterbank_rows_are_non_negative_and_non_empty() {
        let fb = mel_filterbank(22050, 2048, 128);
        assert_eq!(fb.len(), 128);
        for row in &fb {
            assert_eq!(row.len(), 1025);
            assert!(row.iter().all(|&w| w >= 0.0));
        }
        assert!(fb.iter().filter(|row| row.iter().any(|&w| w > 0.0)).count() > 100);
    }

    #[test]
    fn db_conversion_clips_to_top_db() {
        let db = power_to_db(&[vec![1.0, 1e-20]], 80.0);
        assert!((db[0][0] - 0.0).abs() < 1e-9);
        assert!((db[0][1] + 80.0).abs() < 1e-9);
    }
}
