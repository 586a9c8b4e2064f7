use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use htmlwave_core::{HtmlEncoder, HtmlWaveError, SAMPLE_RATE};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared, read-only server state
#[derive(Clone)]
pub struct AppState {
    encoder: Arc<HtmlEncoder>,
    document_root: PathBuf,
    ultrasonic: bool,
}

impl AppState {
    pub fn new(encoder: HtmlEncoder, document_root: PathBuf) -> Self {
        Self {
            ultrasonic: encoder.config().ultrasonic,
            encoder: Arc::new(encoder),
            document_root,
        }
    }
}

/// Body of `GET /api/frequencies`
#[derive(Debug, Serialize)]
pub struct FrequencyResponse {
    pub frequencies: BTreeMap<&'static str, f32>,
    pub sample_rate: usize,
    pub ultrasonic_mode: bool,
}

impl FrequencyResponse {
    pub fn from_encoder(encoder: &HtmlEncoder) -> Self {
        Self {
            frequencies: encoder
                .frequency_map()
                .into_iter()
                .map(|(symbol, frequency)| (symbol.name(), frequency))
                .collect(),
            sample_rate: SAMPLE_RATE,
            ultrasonic_mode: encoder.config().ultrasonic,
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] HtmlWaveError),

    #[error("Encoding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for AudioError {
    fn into_response(self) -> Response {
        let status = match &self {
            AudioError::NotFound(_) => StatusCode::NOT_FOUND,
            AudioError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            AudioError::Io(_) | AudioError::Encode(_) | AudioError::Join(_) => {
                tracing::error!(error = %self, "audio request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/frequencies", get(frequencies))
        .route("/audio/{file}", get(audio))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn frequencies(State(state): State<AppState>) -> Json<FrequencyResponse> {
    let mut response = FrequencyResponse::from_encoder(&state.encoder);
    response.ultrasonic_mode = state.ultrasonic;
    Json(response)
}

async fn audio(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AudioError> {
    if file.contains("..") || file.contains('/') || file.contains('\\') {
        return Err(AudioError::InvalidPath(file));
    }

    let stem = file
        .strip_suffix(".html")
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| AudioError::NotFound(file.clone()))?
        .to_string();

    let path = state.document_root.join(&file);
    if !path.is_file() {
        return Err(AudioError::NotFound(file));
    }

    let html = tokio::fs::read_to_string(&path).await?;
    let encoder = state.encoder.clone();
    let wav = tokio::task::spawn_blocking(move || encoder.encode_wav(&html)).await??;

    tracing::info!(file = %file, bytes = wav.len(), "served audio");
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.wav\"", stem),
            ),
        ],
        wav,
    )
        .into_response())
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(address = %local, ultrasonic = state.ultrasonic, "starting audio server");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use htmlwave_core::EncoderConfig;

    #[test]
    fn test_frequency_response_lists_every_symbol() {
        let encoder = HtmlEncoder::new(EncoderConfig::default()).unwrap();
        let response = FrequencyResponse::from_encoder(&encoder);
        assert_eq!(response.frequencies.len(), 20);
        assert_eq!(response.frequencies["start_frame"], 800.0);
        assert_eq!(response.sample_rate, 44100);
        assert!(!response.ultrasonic_mode);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AudioError::NotFound("x.html".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AudioError::InvalidPath("..".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AudioError::Encode(HtmlWaveError::InvalidInputSize)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
