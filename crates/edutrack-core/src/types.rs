use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default minimum vendor confidence for a positive attendance mark.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Face rectangle reported by the vendor's detect call, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRectangle {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// One face found by the vendor's detect call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Transient face identifier. Only valid for an identify call made
    /// shortly afterwards, never persisted.
    pub face_id: String,
    pub rectangle: Option<FaceRectangle>,
}

/// A ranked identify candidate from the reference group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub person_id: String,
    /// Vendor match score in [0, 1].
    pub confidence: f64,
}

#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    OutOfRange(f64),
}

/// Minimum confidence needed to accept an identification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThreshold(f64);

impl ConfidenceThreshold {
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ThresholdError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// True when `confidence` meets or exceeds the threshold.
    pub fn accepts(self, confidence: f64) -> bool {
        confidence >= self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Why an attendance attempt was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NoFaceDetected,
    NoMatch,
    /// The best candidate scored below the threshold; carries its confidence.
    LowConfidence(f64),
}

/// Terminal state of one recognition run.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted { person_id: String, confidence: f64 },
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }
}

/// The decision surfaced to the caller of the gateway.
///
/// A successful outcome always carries the matched person and its confidence;
/// [`AttendanceOutcome::accepted`] is the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOutcome {
    /// Error bodies from the gateway carry only `message`.
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl AttendanceOutcome {
    pub const MARKED: &'static str = "Attendance marked.";

    /// Build the success outcome for an accepted decision.
    ///
    /// Returns `None` for a rejected decision.
    pub fn accepted(decision: &Decision) -> Option<Self> {
        match decision {
            Decision::Accepted {
                person_id,
                confidence,
            } => Some(Self {
                success: true,
                message: Self::MARKED.to_string(),
                person_id: Some(person_id.clone()),
                confidence: Some(*confidence),
            }),
            Decision::Rejected(_) => None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            person_id: None,
            confidence: None,
        }
    }
}
