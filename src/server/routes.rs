use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use http::{header, HeaderValue};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::analysis::{analyze_file, AnalysisResult};
use crate::scratch::{is_unusable_filename, sanitize_filename, ScratchFile};

const UPLOAD_FIELD: &str = "music_file";

const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>trackprobe</title></head>
<body>
  <h1>trackprobe</h1>
  <form action="/analyze" method="post" enctype="multipart/form-data">
    <input type="file" name="music_file" accept="audio/*">
    <button type="submit">Analyze</button>
  </form>
  <p>POST a JSON body <code>{"youtube_url": "..."}</code> to <code>/download</code> for an MP3.</p>
</body>
</html>
"#;

pub async fn fallback_index() -> Html<&'static str> {
    Html(FALLBACK_INDEX)
}

/// `POST /analyze`: save the upload, analyze it off the async runtime, delete it.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or(ApiError::MissingFile)?;
    if file_name.is_empty() {
        return Err(ApiError::NoFileSelected);
    }
    if bytes.is_empty() {
        return Err(ApiError::EmptyFile);
    }

    let name = sanitize_filename(&file_name);
    if is_unusable_filename(&name) {
        return Err(ApiError::InvalidFileName);
    }

    let scratch = ScratchFile::write(&state.config.scratch_dir, &name, &bytes)
        .await
        .map_err(ApiError::Save)?;

    let path = scratch.path().to_path_buf();
    let classifier = state.classifier.clone();
    let result = tokio::task::spawn_blocking(move || analyze_file(&path, &classifier))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()));

    // Removed before responding on every path.
    drop(scratch);

    let result = result??;
    tracing::debug!("Analysis of {} complete", name);
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub youtube_url: Option<String>,
}

fn attachment_header(file_name: &str) -> Result<HeaderValue, ApiError> {
    let quoted: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", quoted))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// `POST /download`: fetch the URL's audio as MP3 and return it as an attachment.
pub async fn download(
    State(state): State<AppState>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let url = match body {
        Ok(Json(DownloadRequest { youtube_url: Some(url) })) if !url.trim().is_empty() => url,
        Ok(_) => return Err(ApiError::MissingUrl),
        Err(rejection) => {
            tracing::debug!("Invalid download request: {}", rejection.body_text());
            return Err(ApiError::MissingUrl);
        }
    };

    let track = state.downloader.download(url.trim()).await?;
    let bytes = tokio::fs::read(&track.path)
        .await
        .map_err(ApiError::ReadDownload)?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
        (header::CONTENT_DISPOSITION, attachment_header(&track.file_name())?),
    ];
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_header_quotes_name() {
        let value = attachment_header("My_Song.mp3").unwrap();
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"My_Song.mp3\"");
    }

    #[test]
    fn attachment_header_neutralizes_quotes() {
        let value = attachment_header("a\"b.mp3").unwrap();
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"a_b.mp3\"");
    }
}
