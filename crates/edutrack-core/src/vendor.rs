//! Seam to the external face-recognition service.

use crate::types::{Candidate, DetectedFace};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VendorError {
    #[error("vendor request failed: {0}")]
    Transport(String),
    #[error("vendor request timed out")]
    Timeout,
    #[error("vendor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected vendor response: {0}")]
    Decode(String),
}

/// Two-call face-recognition protocol: detect, then identify.
#[async_trait]
pub trait FaceVendor: Send + Sync {
    /// Detect faces in raw image bytes, asking the vendor to return
    /// transient face identifiers. Faces come back in vendor order.
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, VendorError>;

    /// Identify a transient face against the reference group.
    /// Candidates come back ranked best-first.
    async fn identify(&self, face_id: &str, group_id: &str)
        -> Result<Vec<Candidate>, VendorError>;
}
