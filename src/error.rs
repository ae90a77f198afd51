// Error types shared across the analysis pipeline and the external tool wrappers.

use std::process::ExitStatus;
use thiserror::Error;

/// Failure of an external command-line tool (ffmpeg, ffprobe, yt-dlp).
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be spawned at all (not installed, not on PATH).
    #[error("{tool} not found: {source}")]
    NotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The tool ran but exited with a non-zero status.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The tool succeeded but its output could not be understood.
    #[error("{tool} produced unexpected output: {reason}")]
    Malformed { tool: String, reason: String },
    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn malformed(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::Malformed {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure while decoding or analyzing an audio clip.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to open audio file: {0}")]
    Open(#[from] std::io::Error),
    #[error("Decoding error: {0}")]
    Decode(String),
    #[error("Resampling error: {0}")]
    Resample(String),
    #[error("No audio samples to analyze")]
    Empty,
    #[error("Audio too short for analysis: {got} samples (need at least {need})")]
    TooShort { got: usize, need: usize },
    #[error("Tempo detection failed: {0}")]
    Tempo(String),
}

/// Failure of the optional genre classifier. Never reaches a caller of the
/// pipeline; it is logged and replaced by "Unknown".
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to load genre model: {0}")]
    Load(String),
    #[error("Genre inference failed: {0}")]
    Inference(String),
    #[error("Genre model produced no scores")]
    NoScores,
}
