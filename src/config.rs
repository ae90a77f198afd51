// Runtime configuration: CLI flags with environment fallbacks.

use anyhow::Context;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::genre::GenreClassifier;
use crate::metadata::FfmpegTools;
use crate::tools::ytdlp::Downloader;
use crate::tools::ExternalTool;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Directory for uploaded clips and downloaded MP3s
    #[arg(long, env = "TRACKPROBE_SCRATCH_DIR", default_value = "uploads", global = true)]
    pub scratch_dir: PathBuf,

    /// Genre classifier model; genre is "Unknown" when the file is absent
    #[arg(long, env = "TRACKPROBE_MODEL", default_value = "genre_classifier.onnx", global = true)]
    pub model: PathBuf,

    /// Directory holding index.html for the web page
    #[arg(long, env = "TRACKPROBE_STATIC_DIR", default_value = "templates", global = true)]
    pub static_dir: PathBuf,

    #[arg(long, env = "TRACKPROBE_ADDR", default_value = "127.0.0.1:5000", global = true)]
    pub addr: SocketAddr,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "TRACKPROBE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES, global = true)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "TRACKPROBE_FFMPEG", default_value = "ffmpeg", global = true)]
    pub ffmpeg: PathBuf,

    #[arg(long, env = "TRACKPROBE_FFPROBE", default_value = "ffprobe", global = true)]
    pub ffprobe: PathBuf,

    #[arg(long, env = "TRACKPROBE_YTDLP", default_value = "yt-dlp", global = true)]
    pub ytdlp: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("uploads"),
            model: PathBuf::from("genre_classifier.onnx"),
            static_dir: PathBuf::from("templates"),
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            ytdlp: PathBuf::from("yt-dlp"),
        }
    }
}

impl Config {
    /// Create the scratch directory if needed.
    pub fn prepare(&self) -> anyhow::Result<()> {
        crate::scratch::ensure_dir(&self.scratch_dir)
            .with_context(|| format!("Failed to create scratch directory {:?}", self.scratch_dir))?;
        tracing::debug!("Scratch directory ready: {:?}", self.scratch_dir);
        Ok(())
    }

    pub fn classifier(&self) -> GenreClassifier {
        GenreClassifier::load(&self.model)
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(ExternalTool::new("yt-dlp", &self.ytdlp), &self.scratch_dir)
    }

    pub fn media_tools(&self) -> FfmpegTools {
        FfmpegTools::new(
            ExternalTool::new("ffprobe", &self.ffprobe),
            ExternalTool::new("ffmpeg", &self.ffmpeg),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            scratch_dir: dir.path().join("nested").join("uploads"),
            ..Config::default()
        };
        config.prepare().unwrap();
        assert!(config.scratch_dir.is_dir());
    }

    #[test]
    fn missing_model_disables_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model: dir.path().join("absent.onnx"),
            ..Config::default()
        };
        assert!(!config.classifier().is_active());
    }
}
