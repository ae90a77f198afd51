// Feature extraction pipeline: one decoding pass over a clip produces an AnalysisResult.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::decoder::{decode_clip, MonoAudio, MAX_CLIP_SECONDS};
use crate::audio::{bpm, energy, key, onset};
use crate::error::AnalysisError;
use crate::genre::GenreClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Happiness {
    High,
    Low,
}

impl Happiness {
    /// "High" iff the key label contains "Major".
    pub fn from_key_label(key: &str) -> Self {
        if key.contains("Major") {
            Happiness::High
        } else {
            Happiness::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Happiness::High => "High",
            Happiness::Low => "Low",
        }
    }
}

/// Everything reported for one analyzed clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Alt Key")]
    pub alt_key: String,
    #[serde(rename = "BPM")]
    pub bpm: f64,
    #[serde(rename = "Energy")]
    pub energy: f64,
    #[serde(rename = "Danceability")]
    pub danceability: f64,
    #[serde(rename = "Happiness")]
    pub happiness: Happiness,
    #[serde(rename = "Genre")]
    pub genre: String,
    #[serde(rename = "Prompt")]
    pub prompt: String,
}

/// Round to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Text prompt summarizing the clip for a music generation service.
pub fn build_prompt(key: &str, bpm: f64, energy: f64, danceability: f64, genre: &str) -> String {
    format!(
        "key of {}, BPM of {}. energy {}, danceability {}, Genre: {}",
        key, bpm, energy, danceability, genre
    )
}

/// Decode the first minute of `path` and analyze it.
pub fn analyze_file(path: &Path, classifier: &GenreClassifier) -> Result<AnalysisResult, AnalysisError> {
    let audio = decode_clip(path, MAX_CLIP_SECONDS)?;
    tracing::debug!("File loaded: {:?}", path);
    analyze_clip(&audio, classifier)
}

/// Run every feature extractor over an already decoded clip.
pub fn analyze_clip(audio: &MonoAudio, classifier: &GenreClassifier) -> Result<AnalysisResult, AnalysisError> {
    let tempo = bpm::detect_bpm_from_samples(audio)?;
    let bpm = round_to(tempo.bpm, 2);
    tracing::debug!("BPM detected: {} (confidence {:.2})", bpm, tempo.confidence);

    let key_result = key::detect_key_from_samples(audio)?;
    let key = key_result.key.to_string();
    let alt_key = key_result.alt_key.to_string();
    tracing::debug!("Key detected: {}", key);
    tracing::debug!("Alternate key detected: {}", alt_key);

    let energy = round_to(energy::mean_energy(audio), 4);
    tracing::debug!("Energy: {}", energy);

    let danceability = round_to(onset::mean_onset_strength(audio), 4);
    tracing::debug!("Danceability: {}", danceability);

    let genre = classifier.classify(audio);
    tracing::debug!("Genre detected: {}", genre);

    let happiness = Happiness::from_key_label(&key);
    tracing::debug!("Happiness: {}", happiness.as_str());

    let prompt = build_prompt(&key, bpm, energy, danceability, &genre);
    tracing::debug!("Prompt: {}", prompt);

    Ok(AnalysisResult {
        key,
        alt_key,
        bpm,
        energy,
        danceability,
        happiness,
        genre,
        prompt,
    })
}

/// Plain-text report, one field per line (used by the `analyze` subcommand).
pub fn format_report(file_name: &str, result: &AnalysisResult) -> String {
    format!(
        "File: {}\nKey: {}\nAlternate key: {}\nBPM: {:.2}\nEnergy: {:.4}\nDanceability: {:.4}\nHappiness: {}\nGenre: {}\n",
        file_name,
        result.key,
        result.alt_key,
        result.bpm,
        result.energy,
        result.danceability,
        result.happiness.as_str(),
        result.genre,
    )
}
