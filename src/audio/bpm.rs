// Tempo estimation using aubio's Tempo tracker.
//
// 1. Feed the clip in hop-sized frames to aubio's Tempo tracker
// 2. The tracker detects onsets (spectral flux) and autocorrelates them
// 3. The final BPM estimate is read once every frame has been consumed

use bliss_audio_aubio_rs::{OnsetMode, Tempo};

use super::decoder::MonoAudio;
use crate::error::AnalysisError;

/// Result of tempo estimation for a single clip
#[derive(Debug, Clone)]
pub struct BpmResult {
    /// Estimated tempo in beats per minute, 0.0 when no plausible tempo was found
    pub bpm: f64,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
}

/// FFT window size for onset detection.
const BUF_SIZE: usize = 1024;

/// Hop size between frames (50% overlap).
const HOP_SIZE: usize = 512;

/// Estimates outside this range are treated as "no tempo found".
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 320.0;

/// Estimate tempo from pre-decoded mono audio samples.
pub fn detect_bpm_from_samples(audio: &MonoAudio) -> Result<BpmResult, AnalysisError> {
    if audio.samples.is_empty() {
        return Err(AnalysisError::Empty);
    }

    let mut tempo = Tempo::new(OnsetMode::SpecFlux, BUF_SIZE, HOP_SIZE, audio.sample_rate)
        .map_err(|e| AnalysisError::Tempo(format!("Failed to create aubio Tempo detector: {:?}", e)))?;

    for (i, frame) in audio.samples.chunks_exact(HOP_SIZE).enumerate() {
        tempo
            .do_result(frame)
            .map_err(|e| AnalysisError::Tempo(format!("error at frame {}: {:?}", i, e)))?;
    }

    let bpm = tempo.get_bpm() as f64;
    let confidence = (tempo.get_confidence() as f64).clamp(0.0, 1.0);

    if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Ok(BpmResult {
            bpm: 0.0,
            confidence: 0.0,
        });
    }

    Ok(BpmResult { bpm, confidence })
}
