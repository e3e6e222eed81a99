//! HTTP boundary for attendance marking.
//!
//! `POST /api/mark-attendance` takes one multipart image part, runs it
//! through the [`RecognitionAdapter`] and translates the decision into a
//! uniform JSON contract. Vendor error shapes never reach the client.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use edutrack_core::{AttendanceOutcome, Decision, RecognitionAdapter, RejectReason};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";
/// Header correlating a client attempt with server logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Read-only state shared by every request.
pub struct AppState {
    pub adapter: RecognitionAdapter,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("No image file uploaded.")]
    NoImage,
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
    #[error("No face detected in the image.")]
    NoFaceDetected,
    #[error("Student not recognized.")]
    NotRecognized,
    #[error("Student not recognized (Confidence too low: {0})")]
    LowConfidence(f64),
    #[error("An error occurred on the server.")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotRecognized => StatusCode::NOT_FOUND,
            GatewayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<RejectReason> for GatewayError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::NoFaceDetected => GatewayError::NoFaceDetected,
            RejectReason::NoMatch => GatewayError::NotRecognized,
            RejectReason::LowConfidence(c) => GatewayError::LowConfidence(c),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Build the API router.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/mark-attendance", post(mark_attendance))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "startedAt": state.started_at.to_rfc3339(),
        "personGroupId": state.adapter.group_id(),
        "threshold": state.adapter.threshold().value(),
    }))
}

async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!("mark_attendance", request_id = %request_id);
    let mut response = match handle_upload(&state, multipart).instrument(span).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<AttendanceOutcome, GatewayError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "request is not multipart");
        GatewayError::NoImage
    })?;

    let image = read_image(&mut multipart).await?;
    tracing::info!(bytes = image.len(), "image received");

    let decision = state.adapter.recognize(&image).await.map_err(|e| {
        tracing::error!(error = %e, "recognition failed");
        GatewayError::Internal
    })?;

    match decision {
        Decision::Rejected(reason) => {
            tracing::info!(?reason, "attendance rejected");
            Err(reason.into())
        }
        accepted => AttendanceOutcome::accepted(&accepted).ok_or(GatewayError::Internal),
    }
}

/// Pull the bytes of the image part, ignoring any other fields.
async fn read_image(multipart: &mut Multipart) -> Result<Vec<u8>, GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "malformed multipart body");
        GatewayError::MalformedUpload(e.body_text())
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        tracing::debug!(
            filename = field.file_name().unwrap_or(""),
            content_type = field.content_type().unwrap_or(""),
            "image field"
        );
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::MalformedUpload(e.body_text()))?;
        if bytes.is_empty() {
            return Err(GatewayError::NoImage);
        }
        return Ok(bytes.to_vec());
    }
    Err(GatewayError::NoImage)
}
