//! edutrack-core — Attendance recognition decisions.
//!
//! Wraps a face-recognition vendor's detect/identify protocol behind the
//! [`FaceVendor`] trait and applies the confidence policy that decides
//! whether a photo marks a student present.

pub mod adapter;
pub mod role;
pub mod types;
pub mod vendor;

pub use adapter::{AdapterError, RecognitionAdapter};
pub use role::{Role, Route};
pub use types::{
    AttendanceOutcome, Candidate, ConfidenceThreshold, Decision, DetectedFace, FaceRectangle,
    RejectReason,
};
pub use vendor::{FaceVendor, VendorError};
