//! HTTP client for the face-recognition vendor (Azure Face REST protocol).

use async_trait::async_trait;
use edutrack_core::{Candidate, DetectedFace, FaceRectangle, FaceVendor, VendorError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const DETECT_PATH: &str = "/face/v1.0/detect";
const IDENTIFY_PATH: &str = "/face/v1.0/identify";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectEntry {
    face_id: String,
    face_rectangle: Option<FaceRectangle>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyRequest<'a> {
    face_ids: [&'a str; 1],
    person_group_id: &'a str,
    max_num_of_candidates_returned: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyEntry {
    #[serde(default)]
    candidates: Vec<CandidateEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateEntry {
    person_id: String,
    confidence: f64,
}

pub struct FaceApiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_candidates: u32,
}

impl FaceApiClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        max_candidates: u32,
        timeout: Duration,
    ) -> Result<Self, VendorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VendorError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            max_candidates,
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, VendorError> {
        let response = request
            .header(KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VendorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| VendorError::Decode(e.to_string()))
    }
}

fn map_transport(err: reqwest::Error) -> VendorError {
    if err.is_timeout() {
        VendorError::Timeout
    } else {
        VendorError::Transport(err.to_string())
    }
}

#[async_trait]
impl FaceVendor for FaceApiClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, VendorError> {
        let request = self
            .client
            .post(format!("{}{DETECT_PATH}", self.endpoint))
            .query(&[("returnFaceId", "true")])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());

        let entries: Vec<DetectEntry> = self.send(request).await?;
        Ok(entries
            .into_iter()
            .map(|e| DetectedFace {
                face_id: e.face_id,
                rectangle: e.face_rectangle,
            })
            .collect())
    }

    async fn identify(
        &self,
        face_id: &str,
        group_id: &str,
    ) -> Result<Vec<Candidate>, VendorError> {
        let body = IdentifyRequest {
            face_ids: [face_id],
            person_group_id: group_id,
            max_num_of_candidates_returned: self.max_candidates,
        };
        let request = self
            .client
            .post(format!("{}{IDENTIFY_PATH}", self.endpoint))
            .json(&body);

        let entries: Vec<IdentifyEntry> = self.send(request).await?;
        Ok(entries
            .into_iter()
            .next()
            .map(|e| e.candidates)
            .unwrap_or_default()
            .into_iter()
            .map(|c| Candidate {
                person_id: c.person_id,
                confidence: c.confidence,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: String) -> FaceApiClient {
        FaceApiClient::new(endpoint, "test-key", 1, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_detect_sends_raw_bytes_and_key() {
        let router = Router::new().route(
            DETECT_PATH,
            post(
                |Query(q): Query<HashMap<String, String>>, headers: HeaderMap, body: Bytes| async move {
                    assert_eq!(q.get("returnFaceId").map(String::as_str), Some("true"));
                    assert_eq!(headers[KEY_HEADER], "test-key");
                    assert_eq!(headers["content-type"], "application/octet-stream");
                    assert_eq!(&body[..], b"jpeg-bytes");
                    Json(serde_json::json!([
                        {"faceId": "f-1", "faceRectangle": {"top": 1, "left": 2, "width": 30, "height": 40}},
                        {"faceId": "f-2"}
                    ]))
                },
            ),
        );
        let faces = client(serve(router).await).detect(b"jpeg-bytes").await.unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].face_id, "f-1");
        assert_eq!(
            faces[0].rectangle,
            Some(FaceRectangle { top: 1, left: 2, width: 30, height: 40 })
        );
        assert!(faces[1].rectangle.is_none());
    }

    #[tokio::test]
    async fn test_identify_posts_group_and_maps_candidates() {
        let router = Router::new().route(
            IDENTIFY_PATH,
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["faceIds"], serde_json::json!(["f-1"]));
                assert_eq!(body["personGroupId"], "class-7a");
                assert_eq!(body["maxNumOfCandidatesReturned"], 1);
                Json(serde_json::json!([
                    {"faceId": "f-1", "candidates": [{"personId": "p-1", "confidence": 0.85}]}
                ]))
            }),
        );
        let candidates = client(serve(router).await)
            .identify("f-1", "class-7a")
            .await
            .unwrap();
        assert_eq!(
            candidates,
            vec![Candidate { person_id: "p-1".into(), confidence: 0.85 }]
        );
    }

    #[tokio::test]
    async fn test_identify_empty_response_is_no_candidates() {
        let router = Router::new().route(
            IDENTIFY_PATH,
            post(|| async { Json(serde_json::json!([])) }),
        );
        let candidates = client(serve(router).await).identify("f-1", "g").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let router = Router::new().route(
            DETECT_PATH,
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let err = client(serve(router).await).detect(b"x").await.unwrap_err();
        match err {
            VendorError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let router = Router::new().route(DETECT_PATH, post(|| async { "not json" }));
        let err = client(serve(router).await).detect(b"x").await.unwrap_err();
        assert!(matches!(err, VendorError::Decode(_)));
    }

    #[tokio::test]
    async fn test_slow_vendor_times_out() {
        let router = Router::new().route(
            DETECT_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(serde_json::json!([]))
            }),
        );
        let endpoint = serve(router).await;
        let client = FaceApiClient::new(endpoint, "k", 1, Duration::from_millis(200)).unwrap();
        let err = client.detect(b"x").await.unwrap_err();
        assert!(matches!(err, VendorError::Timeout));
    }
}
