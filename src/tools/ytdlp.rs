// Retriever: download a video's best audio stream and transcode it to MP3 with yt-dlp.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::ExternalTool;
use crate::error::ToolError;
use crate::scratch::sanitize_filename;

/// Separator yt-dlp substitutes for `|` in titles; renamed away after download.
const FULLWIDTH_VERTICAL_LINE: char = '\u{FF5C}';

#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp ran and reported a failure (network, unavailable video, ...).
    #[error("Download failed: {0}")]
    Downloader(#[source] ToolError),
    /// yt-dlp is missing or its output could not be understood.
    #[error("Unexpected error during download: {0}")]
    Tool(#[source] ToolError),
    #[error("Failed to obtain the video title")]
    MissingTitle,
    #[error("MP3 file was not created: {0:?}")]
    MissingFile(PathBuf),
    #[error("Failed to sanitize the file name: {0}")]
    Rename(#[source] std::io::Error),
}

impl DownloadError {
    /// True when the downloader itself reported the failure.
    pub fn is_downloader_failure(&self) -> bool {
        matches!(self, DownloadError::Downloader(_))
    }
}

impl From<ToolError> for DownloadError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Failed { .. } => DownloadError::Downloader(e),
            other => DownloadError::Tool(other),
        }
    }
}

/// An MP3 written to the scratch directory by the downloader.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedTrack {
    pub title: String,
    pub path: PathBuf,
}

impl DownloadedTrack {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    tool: ExternalTool,
    output_dir: PathBuf,
}

impl Downloader {
    pub fn new(tool: ExternalTool, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            output_dir: output_dir.into(),
        }
    }

    /// Download `url` as a 320kbps MP3 into the output directory.
    pub async fn download(&self, url: &str) -> Result<DownloadedTrack, DownloadError> {
        tracing::debug!("URL received for download: {}", url);
        let output = self.tool.run(download_args(url, &self.output_dir)).await?;
        let (title, path) = parse_download_output(&output.stdout)?;

        let path = sanitize_downloaded_name(&path)?;
        if !path.exists() {
            tracing::error!("MP3 file was not created: {:?}", path);
            return Err(DownloadError::MissingFile(path));
        }

        tracing::debug!("MP3 downloaded: {:?}", path);
        Ok(DownloadedTrack { title, path })
    }
}

/// Arguments for a best-audio download transcoded to MP3 at 320kbps.
///
/// yt-dlp prints the title before downloading and the final file path after
/// post-processing, one per line.
pub fn download_args(url: &str, output_dir: &Path) -> Vec<String> {
    let template = output_dir.join("%(title)s.%(ext)s");
    vec![
        "--format".into(),
        "bestaudio/best".into(),
        "--extract-audio".into(),
        "--audio-format".into(),
        "mp3".into(),
        "--audio-quality".into(),
        "320K".into(),
        "--restrict-filenames".into(),
        "--no-warnings".into(),
        "--no-simulate".into(),
        "--print".into(),
        "title".into(),
        "--print".into(),
        "after_move:filepath".into(),
        "--output".into(),
        template.to_string_lossy().into_owned(),
        "--".into(),
        url.to_string(),
    ]
}

/// Extract `(title, file path)` from the downloader's printed output.
pub fn parse_download_output(stdout: &str) -> Result<(String, PathBuf), DownloadError> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    match lines.as_slice() {
        [] => Err(DownloadError::MissingTitle),
        [_] => Err(DownloadError::Tool(ToolError::malformed(
            "yt-dlp",
            "no output file path printed",
        ))),
        [title, .., path] => {
            if title.eq_ignore_ascii_case("NA") {
                return Err(DownloadError::MissingTitle);
            }
            Ok((title.to_string(), PathBuf::from(path)))
        }
    }
}

/// Rename the file in place when its name contains `｜`. Returns the final path.
pub fn sanitize_downloaded_name(path: &Path) -> Result<PathBuf, DownloadError> {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(path.to_path_buf());
    };
    if !name.contains(FULLWIDTH_VERTICAL_LINE) {
        return Ok(path.to_path_buf());
    }

    let sanitized = path.with_file_name(sanitize_filename(&name));
    std::fs::rename(path, &sanitized).map_err(|e| {
        tracing::error!("Failed to rename {:?}: {}", path, e);
        DownloadError::Rename(e)
    })?;
    tracing::debug!("File renamed from {:?} to {:?}", path, sanitized);
    Ok(sanitized)
}
