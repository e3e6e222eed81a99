//! Uploads a captured photo to the gateway and maps the HTTP result to
//! something to show the user.

use edutrack_capture::CapturedImage;
use edutrack_core::AttendanceOutcome;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Client-side limit on one upload, response included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Attendance marked.";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Student not recognized.";

const MARK_ATTENDANCE_PATH: &str = "/api/mark-attendance";
const IMAGE_FIELD: &str = "image";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("an upload is already in progress")]
    Busy,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid image MIME type '{0}'")]
    InvalidMime(String),
}

/// What the user sees after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub result: AttendanceOutcome,
    /// Id sent as `X-Request-Id`; lets an attempt be found in server logs.
    pub request_id: String,
}

pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    in_flight: Semaphore,
}

impl UploadClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            in_flight: Semaphore::new(1),
        })
    }

    /// Send one photo for recognition.
    ///
    /// Only one upload may be outstanding; a concurrent call gets
    /// [`UploadError::Busy`]. Transport failures and timeouts are not errors:
    /// they come back as a failed outcome with the default message.
    pub async fn upload_for_recognition(
        &self,
        image: &CapturedImage,
    ) -> Result<UploadOutcome, UploadError> {
        let _permit = self.in_flight.try_acquire().map_err(|_| UploadError::Busy)?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mime)
            .map_err(|_| UploadError::InvalidMime(image.mime.clone()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        tracing::info!(
            request_id = %request_id,
            bytes = image.bytes.len(),
            mime = %image.mime,
            "uploading image"
        );

        let result = self
            .http
            .post(format!("{}{MARK_ATTENDANCE_PATH}", self.base_url))
            .header(REQUEST_ID_HEADER, &request_id)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    timeout = e.is_timeout(),
                    error = %e,
                    "upload failed"
                );
                return Ok(failure(None, request_id));
            }
        };

        let status = response.status();
        // A timeout while reading the body counts the same as no response.
        let payload: Option<AttendanceOutcome> = match response.bytes().await {
            Ok(body) => serde_json::from_slice(&body).ok(),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "reading response failed");
                return Ok(failure(None, request_id));
            }
        };

        tracing::info!(request_id = %request_id, status = status.as_u16(), "upload complete");

        let payload = payload.unwrap_or_else(|| AttendanceOutcome::failure(""));
        if status.is_success() {
            Ok(UploadOutcome {
                result: AttendanceOutcome {
                    success: true,
                    message: non_empty(payload.message)
                        .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
                    person_id: payload.person_id,
                    confidence: payload.confidence,
                },
                request_id,
            })
        } else {
            Ok(failure(non_empty(payload.message), request_id))
        }
    }
}

fn failure(message: Option<String>, request_id: String) -> UploadOutcome {
    UploadOutcome {
        result: AttendanceOutcome::failure(
            message.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        ),
        request_id,
    }
}

fn non_empty(message: String) -> Option<String> {
    Some(message).filter(|m| !m.is_empty())
}
