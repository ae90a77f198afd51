// Web front-end: multipart analysis, YouTube-to-MP3 download and the index page.

pub mod routes;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AnalysisError;
use crate::genre::GenreClassifier;
use crate::tools::ytdlp::{DownloadError, Downloader};

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub classifier: GenreClassifier,
    pub downloader: Downloader,
}

impl AppState {
    pub fn new(config: Config, classifier: GenreClassifier) -> Self {
        let downloader = config.downloader();
        Self {
            config: Arc::new(config),
            classifier,
            downloader,
        }
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }
}

/// Errors returned by the HTTP handlers as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file sent.")]
    MissingFile,
    #[error("No file selected.")]
    NoFileSelected,
    #[error("The uploaded file is empty.")]
    EmptyFile,
    #[error("Invalid file name.")]
    InvalidFileName,
    #[error("No YouTube URL sent.")]
    MissingUrl,
    #[error("The uploaded file is too large.")]
    TooLarge,
    #[error("Invalid upload: {0}")]
    BadUpload(String),
    #[error("Error saving the file: {0}")]
    Save(#[source] std::io::Error),
    #[error("Error during audio analysis: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("{0}")]
    Download(#[from] DownloadError),
    #[error("Failed to read the downloaded MP3: {0}")]
    ReadDownload(#[source] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile
            | ApiError::NoFileSelected
            | ApiError::EmptyFile
            | ApiError::InvalidFileName
            | ApiError::MissingUrl
            | ApiError::BadUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge
        } else {
            ApiError::BadUpload(e.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let index = state.config.static_dir.join("index.html");
    let pages = if index.is_file() {
        tracing::debug!("Serving index page from {:?}", index);
        Router::new().route_service("/", ServeFile::new(index))
    } else {
        tracing::warn!("No index.html in {:?}, using built-in page", state.config.static_dir);
        Router::new().route("/", get(routes::fallback_index))
    };

    let body_limit = state.config.max_upload_bytes;
    let api = Router::new()
        .route("/analyze", post(routes::analyze))
        .route("/download", post(routes::download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    pages
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Server listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    #[test]
    fn input_errors_are_bad_requests() {
        for err in [
            ApiError::MissingFile,
            ApiError::NoFileSelected,
            ApiError::EmptyFile,
            ApiError::InvalidFileName,
            ApiError::MissingUrl,
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn oversized_upload_is_payload_too_large() {
        assert_eq!(ApiError::TooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::TooLarge.to_string(), "The uploaded file is too large.");
    }

    #[test]
    fn tool_failures_are_server_errors_with_message() {
        let err = ApiError::from(DownloadError::Tool(ToolError::malformed("yt-dlp", "garbled")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Unexpected error during download"));

        let err = ApiError::from(AnalysisError::Empty);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Error during audio analysis: No audio samples to analyze");
    }
}
