//! Recognition adapter: drives the detect → identify → score sequence for
//! one image and turns the vendor's answers into a [`Decision`].
//!
//! Each call walks the same state machine from `Idle`:
//!
//! ```text
//! Idle → Detecting ──(no faces)──────────→ Rejected(NoFaceDetected)
//!            │
//!            └→ Identifying ──(no candidates)→ Rejected(NoMatch)
//!                    │
//!                    └→ Scoring ──(c < t)────→ Rejected(LowConfidence(c))
//!                           └────(c >= t)────→ Accepted
//! ```
//!
//! Only the first detected face and the first (vendor-ranked) candidate are
//! considered. Nothing is kept between calls.

use crate::types::{Candidate, ConfidenceThreshold, Decision, RejectReason};
use crate::vendor::{FaceVendor, VendorError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("detect call failed: {0}")]
    Detect(#[source] VendorError),
    #[error("identify call failed: {0}")]
    Identify(#[source] VendorError),
}

/// Per-request progress through the recognition protocol.
#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Detecting,
    Identifying { face_id: String },
    Scoring { candidate: Candidate },
    Done(Decision),
}

/// Read-only recognition policy shared by every request.
pub struct RecognitionAdapter {
    vendor: Arc<dyn FaceVendor>,
    group_id: String,
    threshold: ConfidenceThreshold,
}

impl RecognitionAdapter {
    pub fn new(
        vendor: Arc<dyn FaceVendor>,
        group_id: impl Into<String>,
        threshold: ConfidenceThreshold,
    ) -> Self {
        Self {
            vendor,
            group_id: group_id.into(),
            threshold,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn threshold(&self) -> ConfidenceThreshold {
        self.threshold
    }

    /// Run the full protocol for one image.
    ///
    /// Vendor failures at any step abort the run; they are never retried.
    pub async fn recognize(&self, image: &[u8]) -> Result<Decision, AdapterError> {
        let mut state = State::Idle;
        loop {
            state = match state {
                State::Idle => State::Detecting,
                State::Detecting => self.detect(image).await?,
                State::Identifying { face_id } => self.identify(&face_id).await?,
                State::Scoring { candidate } => State::Done(self.score(candidate)),
                State::Done(decision) => return Ok(decision),
            };
        }
    }

    async fn detect(&self, image: &[u8]) -> Result<State, AdapterError> {
        let faces = self
            .vendor
            .detect(image)
            .await
            .map_err(AdapterError::Detect)?;
        tracing::debug!(faces = faces.len(), bytes = image.len(), "detect complete");

        let Some(face) = faces.into_iter().next() else {
            return Ok(State::Done(Decision::Rejected(RejectReason::NoFaceDetected)));
        };
        Ok(State::Identifying {
            face_id: face.face_id,
        })
    }

    async fn identify(&self, face_id: &str) -> Result<State, AdapterError> {
        let candidates = self
            .vendor
            .identify(face_id, &self.group_id)
            .await
            .map_err(AdapterError::Identify)?;
        tracing::debug!(
            candidates = candidates.len(),
            group = %self.group_id,
            "identify complete"
        );

        Ok(match candidates.into_iter().next() {
            Some(candidate) => State::Scoring { candidate },
            None => State::Done(Decision::Rejected(RejectReason::NoMatch)),
        })
    }

    fn score(&self, candidate: Candidate) -> Decision {
        if self.threshold.accepts(candidate.confidence) {
            tracing::info!(
                person_id = %candidate.person_id,
                confidence = candidate.confidence,
                "candidate accepted"
            );
            Decision::Accepted {
                person_id: candidate.person_id,
                confidence: candidate.confidence,
            }
        } else {
            tracing::info!(
                confidence = candidate.confidence,
                threshold = self.threshold.value(),
                "candidate below threshold"
            );
            Decision::Rejected(RejectReason::LowConfidence(candidate.confidence))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectedFace;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted vendor that records the calls it receives.
    #[derive(Default)]
    struct ScriptedVendor {
        faces: Vec<DetectedFace>,
        candidates: Vec<Candidate>,
        fail_identify: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedVendor {
        fn with_faces(ids: &[&str]) -> Self {
            Self {
                faces: ids
                    .iter()
                    .map(|id| DetectedFace {
                        face_id: id.to_string(),
                        rectangle: None,
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn candidates(mut self, list: &[(&str, f64)]) -> Self {
            self.candidates = list
                .iter()
                .map(|(id, c)| Candidate {
                    person_id: id.to_string(),
                    confidence: *c,
                })
                .collect();
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FaceVendor for ScriptedVendor {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<DetectedFace>, VendorError> {
            self.calls.lock().unwrap().push("detect".into());
            Ok(self.faces.clone())
        }

        async fn identify(
            &self,
            face_id: &str,
            group_id: &str,
        ) -> Result<Vec<Candidate>, VendorError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("identify:{face_id}:{group_id}"));
            if self.fail_identify {
                return Err(VendorError::Status {
                    status: 503,
                    body: "busy".into(),
                });
            }
            Ok(self.candidates.clone())
        }
    }

    fn adapter(vendor: Arc<ScriptedVendor>) -> RecognitionAdapter {
        RecognitionAdapter::new(vendor, "class-7a", ConfidenceThreshold::default())
    }

    #[tokio::test]
    async fn test_no_face_rejects_without_identify() {
        let vendor = Arc::new(ScriptedVendor::default());
        let decision = adapter(vendor.clone()).recognize(b"img").await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::NoFaceDetected));
        assert_eq!(vendor.calls(), vec!["detect"]);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_no_match() {
        let vendor = Arc::new(ScriptedVendor::with_faces(&["f1"]));
        let decision = adapter(vendor).recognize(b"img").await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::NoMatch));
    }

    #[tokio::test]
    async fn test_high_confidence_accepted_unchanged() {
        let vendor = Arc::new(ScriptedVendor::with_faces(&["f1"]).candidates(&[("p-42", 0.85)]));
        let decision = adapter(vendor).recognize(b"img").await.unwrap();
        assert_eq!(
            decision,
            Decision::Accepted {
                person_id: "p-42".into(),
                confidence: 0.85
            }
        );
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_accepted() {
        let vendor = Arc::new(ScriptedVendor::with_faces(&["f1"]).candidates(&[("p-1", 0.70)]));
        let decision = adapter(vendor).recognize(b"img").await.unwrap();
        assert!(decision.is_accepted());
    }

    #[tokio::test]
    async fn test_low_confidence_carries_value() {
        let vendor = Arc::new(ScriptedVendor::with_faces(&["f1"]).candidates(&[("p-1", 0.55)]));
        let decision = adapter(vendor).recognize(b"img").await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::LowConfidence(0.55)));
    }

    #[tokio::test]
    async fn test_first_candidate_wins_without_reranking() {
        let vendor = Arc::new(
            ScriptedVendor::with_faces(&["f1"]).candidates(&[("first", 0.60), ("second", 0.95)]),
        );
        let decision = adapter(vendor).recognize(b"img").await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::LowConfidence(0.60)));
    }

    #[tokio::test]
    async fn test_only_first_face_identified() {
        let vendor = Arc::new(
            ScriptedVendor::with_faces(&["face-a", "face-b"]).candidates(&[("p-1", 0.9)]),
        );
        adapter(vendor.clone()).recognize(b"img").await.unwrap();
        assert_eq!(vendor.calls(), vec!["detect", "identify:face-a:class-7a"]);
    }

    #[tokio::test]
    async fn test_identify_failure_is_error() {
        let vendor = Arc::new(ScriptedVendor {
            fail_identify: true,
            ..ScriptedVendor::with_faces(&["f1"])
        });
        let err = adapter(vendor).recognize(b"img").await.unwrap_err();
        assert!(matches!(err, AdapterError::Identify(VendorError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_repeated_requests_classify_identically() {
        let vendor = Arc::new(ScriptedVendor::with_faces(&["f1"]).candidates(&[("p-9", 0.77)]));
        let adapter = adapter(vendor);
        let first = adapter.recognize(b"same").await.unwrap();
        let second = adapter.recognize(b"same").await.unwrap();
        assert_eq!(first, second);
    }
}
