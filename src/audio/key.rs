// Musical key detection from a time-averaged chroma profile.
//
// Algorithm overview:
// 1. Slide a Hann-windowed frame across the clip and FFT each frame
// 2. Map FFT bins in the 65Hz–2000Hz range to pitch classes (C through B)
// 3. Normalize each frame's 12-bin chroma so its strongest bin is 1.0
// 4. Average the per-frame chroma over time
// 5. The pitch class with the highest mean energy is the dominant note
//
// The scale is not estimated from the signal: C, F and G are labeled Major,
// every other pitch class Minor. The alternate key is the dominant note shifted
// by +9 semitones with the scale flipped.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

use super::decoder::MonoAudio;
use crate::error::AnalysisError;

/// FFT window size for chroma computation.
/// 4096 samples gives ~5Hz resolution at 22050Hz, enough to separate
/// adjacent semitones from C2 (65Hz) upwards.
const FFT_SIZE: usize = 4096;

/// Hop size between consecutive FFT frames (50% overlap).
const HOP_SIZE: usize = 2048;

/// Below ~C2 bass rumble and noise dominate.
const MIN_FREQ: f64 = 65.0;

/// Above ~2000Hz harmonics rather than fundamentals dominate.
const MAX_FREQ: f64 = 2000.0;

/// Pitch class names indexed 0=C .. 11=B.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch classes labeled Major (C, F, G).
const MAJOR_PITCH_CLASSES: [usize; 3] = [0, 5, 7];

/// Semitone shift from a key to its alternate (relative) key.
const RELATIVE_SHIFT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    pub fn flipped(self) -> Self {
        match self {
            Scale::Major => Scale::Minor,
            Scale::Minor => Scale::Major,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scale::Major => "Major",
            Scale::Minor => "Minor",
        }
    }
}

/// A key as pitch class + scale. Displays as e.g. `"A Minor"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub pitch_class: usize,
    pub scale: Scale,
}

impl Key {
    /// Key for a dominant pitch class, applying the C/F/G → Major rule.
    pub fn from_dominant(pitch_class: usize) -> Self {
        let pitch_class = pitch_class % 12;
        let scale = if MAJOR_PITCH_CLASSES.contains(&pitch_class) {
            Scale::Major
        } else {
            Scale::Minor
        };
        Key { pitch_class, scale }
    }

    /// Alternate key: +9 semitones with the scale flipped, in both directions.
    pub fn relative(self) -> Self {
        Key {
            pitch_class: (self.pitch_class + RELATIVE_SHIFT) % 12,
            scale: self.scale.flipped(),
        }
    }

    pub fn note_name(&self) -> &'static str {
        NOTE_NAMES[self.pitch_class]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.note_name(), self.scale.as_str())
    }
}

/// Result of key detection for a single clip
#[derive(Debug, Clone)]
pub struct KeyResult {
    pub key: Key,
    pub alt_key: Key,
    /// Mean per-frame chroma, indexed by pitch class
    pub chroma: [f64; 12],
}

/// Detect key from pre-decoded mono audio samples.
pub fn detect_key_from_samples(audio: &MonoAudio) -> Result<KeyResult, AnalysisError> {
    if audio.samples.is_empty() {
        return Err(AnalysisError::Empty);
    }
    if audio.samples.len() < FFT_SIZE {
        return Err(AnalysisError::TooShort {
            got: audio.samples.len(),
            need: FFT_SIZE,
        });
    }

    let chroma = mean_chroma(&audio.samples, audio.sample_rate);
    let key = Key::from_dominant(dominant_pitch_class(&chroma));

    Ok(KeyResult {
        key,
        alt_key: key.relative(),
        chroma,
    })
}

/// Index of the strongest bin; the first one wins ties.
pub fn dominant_pitch_class(chroma: &[f64; 12]) -> usize {
    let mut best = 0;
    for (pc, &value) in chroma.iter().enumerate() {
        if value > chroma[best] {
            best = pc;
        }
    }
    best
}

/// Time-averaged chroma profile with each frame normalized to a peak of 1.0.
fn mean_chroma(samples: &[f32], sample_rate: u32) -> [f64; 12] {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let window: Vec<f64> = (0..FFT_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (FFT_SIZE - 1) as f64).cos()))
        .collect();

    // 12-TET, A4=440Hz: pitch_class = (round(12 * log2(f / 440)) + 9) mod 12
    let bin_to_pitch_class: Vec<Option<usize>> = (0..FFT_SIZE / 2 + 1)
        .map(|bin| {
            let freq = bin as f64 * sample_rate as f64 / FFT_SIZE as f64;
            if !(MIN_FREQ..=MAX_FREQ).contains(&freq) {
                None
            } else {
                let semitones_from_a = 12.0 * (freq / 440.0).log2();
                let pitch_class = ((semitones_from_a.round() as i32 + 9) % 12 + 12) % 12;
                Some(pitch_class as usize)
            }
        })
        .collect();

    let num_frames = (samples.len() - FFT_SIZE) / HOP_SIZE + 1;
    let mut mean = [0.0f64; 12];

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_SIZE;
        let mut buffer: Vec<Complex<f64>> = samples[start..start + FFT_SIZE]
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new(s as f64 * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        let mut frame = [0.0f64; 12];
        for (bin, pc) in bin_to_pitch_class.iter().enumerate() {
            if let Some(pc) = pc {
                frame[*pc] += buffer[bin].norm_sqr();
            }
        }

        let peak = frame.iter().copied().fold(0.0, f64::max);
        if peak > 0.0 {
            for (m, v) in mean.iter_mut().zip(frame) {
                *m += v / peak;
            }
        }
    }

    for m in mean.iter_mut() {
        *m /= num_frames as f64;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI as PI_F32;

    fn generate_tone(frequency: f64, sample_rate: u32, duration_seconds: f64) -> MonoAudio {
        let total_samples = (sample_rate as f64 * duration_seconds) as usize;
        let samples: Vec<f32> = (0..total_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * PI_F32 * frequency as f32 * t).sin()
            })
            .collect();
        MonoAudio::new(samples, sample_rate)
    }

    #[test]
    fn a_440_is_a_minor() {
        let result = detect_key_from_samples(&generate_tone(440.0, 22050, 5.0)).unwrap();
        assert_eq!(result.key.pitch_class, 9);
        assert_eq!(result.key.to_string(), "A Minor");
        assert_eq!(result.alt_key.to_string(), "F# Major");
    }

    #[test]
    fn middle_c_is_c_major_with_a_minor_alternate() {
        let result = detect_key_from_samples(&generate_tone(261.63, 22050, 5.0)).unwrap();
        assert_eq!(result.key.to_string(), "C Major");
        assert_eq!(result.alt_key.to_string(), "A Minor");
    }

    #[test]
    fn g_tone_is_g_major() {
        let result = detect_key_from_samples(&generate_tone(392.0, 22050, 5.0)).unwrap();
        assert_eq!(result.key.to_string(), "G Major");
    }

    #[test]
    fn detection_is_deterministic() {
        let audio = generate_tone(329.63, 22050, 4.0);
        let first = detect_key_from_samples(&audio).unwrap();
        let second = detect_key_from_samples(&audio).unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(first.alt_key, second.alt_key);
        assert_eq!(first.chroma, second.chroma);
    }

    #[test]
    fn only_c_f_g_are_major() {
        for pc in 0..12 {
            let key = Key::from_dominant(pc);
            let expected = if [0, 5, 7].contains(&pc) {
                Scale::Major
            } else {
                Scale::Minor
            };
            assert_eq!(key.scale, expected, "pitch class {}", pc);
        }
    }

    #[test]
    fn relative_key_shifts_nine_and_flips_scale() {
        for pc in 0..12 {
            let key = Key::from_dominant(pc);
            let alt = key.relative();
            assert_eq!(alt.pitch_class, (pc + 9) % 12);
            assert_eq!(alt.scale, key.scale.flipped());

            // Applying it twice restores the scale; the note moves by 18 ≡ 6 semitones.
            let back = alt.relative();
            assert_eq!(back.scale, key.scale);
            assert_eq!(back.pitch_class, (pc + 6) % 12);
        }
    }

    #[test]
    fn flat_profile_picks_first_bin() {
        assert_eq!(dominant_pitch_class(&[0.5; 12]), 0);
        let mut chroma = [0.1; 12];
        chroma[4] = 0.9;
        chroma[10] = 0.9;
        assert_eq!(dominant_pitch_class(&chroma), 4);
    }

    #[test]
    fn silence_falls_back_to_c_major() {
        let audio = MonoAudio::new(vec![0.0; 22050 * 2], 22050);
        let result = detect_key_from_samples(&audio).unwrap();
        assert_eq!(result.key.to_string(), "C Major");
    }

    #[test]
    fn empty_and_short_audio_are_rejected() {
        let empty = MonoAudio::new(Vec::new(), 22050);
        assert!(matches!(detect_key_from_samples(&empty), Err(AnalysisError::Empty)));
        let short = MonoAudio::new(vec![0.0; 100], 22050);
        assert!(matches!(
            detect_key_from_samples(&short),
            Err(AnalysisError::TooShort { got: 100, .. })
        ));
    }

    #[test]
    fn note_table_is_chromatic() {
        assert_eq!(NOTE_NAMES.len(), 12);
        assert_eq!(NOTE_NAMES[0], "C");
        assert_eq!(NOTE_NAMES[9], "A");
    }
}
