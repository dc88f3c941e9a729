//! Upload/inference client.
//!
//! One multipart POST per capture, field `file`, fixed timeout, no retry.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::Instrument;

use crate::config::INFERENCE_TIMEOUT;
use crate::device::{strip_scheme, DeviceError};
use crate::http::{build_client, map_send_error, read_json, ServiceError};
use crate::models::{CaptureRequest, PredictionRecord};

use super::acquisition::image_extension;
use super::normalize::normalize_prediction;
use super::CaptureError;

/// Anything that can turn a capture into a prediction.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn submit(&self, capture: &CaptureRequest) -> Result<PredictionRecord, CaptureError>;
}

pub struct InferenceClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl InferenceClient {
    pub fn new(endpoint: &str) -> Result<Self, ServiceError> {
        Self::with_timeout(endpoint, INFERENCE_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    async fn upload(&self, capture: &CaptureRequest) -> Result<PredictionRecord, CaptureError> {
        let path = strip_scheme(&capture.source_uri);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| DeviceError::AssetRead {
                uri: capture.source_uri.clone(),
                reason: e.to_string(),
            })?;

        let ext = image_extension(&capture.source_uri);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("image.{ext}"))
            .mime_str(&mime_for(&path))
            .map_err(|e| ServiceError::HttpClient(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.endpoint, self.timeout))?;

        let body = read_json(response, self.timeout).await?;

        normalize_prediction(&body, &capture.source_uri)
            .map_err(|e| CaptureError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn submit(&self, capture: &CaptureRequest) -> Result<PredictionRecord, CaptureError> {
        let span = tracing::info_span!("inference_upload", origin = %capture.origin);
        async {
            let started = Instant::now();
            let result = self.upload(capture).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(record) => tracing::info!(
                    elapsed_ms,
                    disease = %record.disease_name,
                    confidence = ?record.confidence,
                    "Inference complete"
                ),
                Err(CaptureError::MalformedResponse(detail)) => tracing::error!(
                    elapsed_ms,
                    kind = "malformed_response",
                    detail = %detail,
                    "Inference reply rejected"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "Inference failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// MIME type from the file extension; `image/jpeg` unless it is a known image type.
fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaptureOrigin;
    use crate::test_support::{capture_logs, dead_url, spawn_server};
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn capture_file(dir: &Path, name: &str) -> CaptureRequest {
        let path = dir.join(name);
        std::fs::write(&path, b"fake-image").unwrap();
        CaptureRequest {
            source_uri: path.to_string_lossy().into_owned(),
            origin: CaptureOrigin::Gallery,
        }
    }

    async fn echo_upload(mut multipart: Multipart) -> Json<Value> {
        let field = multipart.next_field().await.unwrap().unwrap();
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = field.bytes().await.unwrap().len();
        Json(json!({
            "disease_name": "Blister Blight",
            "confidence": 0.93,
            "field": name,
            "file_name": file_name,
            "content_type": content_type,
            "size": size,
        }))
    }

    #[test]
    fn mime_defaults_to_jpeg() {
        assert_eq!(mime_for(Path::new("/a/leaf.png")), "image/png");
        assert_eq!(mime_for(Path::new("/a/leaf")), "image/jpeg");
        assert_eq!(mime_for(Path::new("/a/leaf.txt")), "image/jpeg");
    }

    #[tokio::test]
    async fn uploads_file_field_with_image_name() {
        let base = spawn_server(Router::new().route("/predict", post(echo_upload))).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{base}/predict")).unwrap();

        let record = client
            .submit(&capture_file(dir.path(), "leaf.png"))
            .await
            .unwrap();

        assert_eq!(record.disease_name, "Blister Blight");
        assert_eq!(record.confidence, Some(0.93));
        assert_eq!(record.metadata["field"], json!("file"));
        assert_eq!(record.metadata["file_name"], json!("image.png"));
        assert_eq!(record.metadata["content_type"], json!("image/png"));
        assert_eq!(record.metadata["size"], json!(10));
    }

    #[tokio::test]
    async fn non_2xx_surfaces_server_message() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": "Image too small"})),
                )
            }),
        );
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{base}/predict")).unwrap();

        let err = client
            .submit(&capture_file(dir.path(), "leaf.jpg"))
            .await
            .unwrap_err();
        match err {
            CaptureError::Server { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message.as_deref(), Some("Image too small"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unlabelled_reply_is_malformed() {
        let app = Router::new().route("/predict", post(|| async { Json(json!({"ok": true})) }));
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{base}/predict")).unwrap();

        let err = client
            .submit(&capture_file(dir.path(), "leaf.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn non_json_success_is_logged_as_malformed() {
        let app = Router::new().route("/predict", post(|| async { "<html>ok</html>" }));
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{base}/predict")).unwrap();
        let capture = capture_file(dir.path(), "leaf.jpg");

        let (result, logs) = capture_logs(client.submit(&capture)).await;

        assert!(matches!(result, Err(CaptureError::MalformedResponse(_))));
        assert!(logs.contains("malformed_response"), "logs: {logs}");
        assert!(logs.contains("ERROR"));
    }

    #[tokio::test]
    async fn unlabelled_reply_is_logged_once() {
        let app = Router::new().route("/predict", post(|| async { Json(json!({"ok": true})) }));
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{base}/predict")).unwrap();
        let capture = capture_file(dir.path(), "leaf.jpg");

        let (_, logs) = capture_logs(client.submit(&capture)).await;

        assert_eq!(logs.matches("malformed_response").count(), 1, "logs: {logs}");
        assert!(!logs.contains("Inference failed"));
    }

    #[tokio::test]
    async fn sub_second_timeout_is_reported_in_millis() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"disease_name": "Late"}))
            }),
        );
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client =
            InferenceClient::with_timeout(&format!("{base}/predict"), Duration::from_millis(200))
                .unwrap();

        let err = client
            .submit(&capture_file(dir.path(), "leaf.jpg"))
            .await
            .unwrap_err();
        match err {
            CaptureError::Network(message) => assert!(message.contains("200ms"), "{message}"),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(&format!("{}/predict", dead_url().await)).unwrap();
        let err = client
            .submit(&capture_file(dir.path(), "leaf.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Network(_)));
    }

    #[tokio::test]
    async fn missing_capture_file_is_device_error() {
        let client = InferenceClient::new("http://127.0.0.1:9/predict").unwrap();
        let capture = CaptureRequest {
            source_uri: "/definitely/missing.jpg".into(),
            origin: CaptureOrigin::Camera,
        };
        let err = client.submit(&capture).await.unwrap_err();
        assert!(matches!(err, CaptureError::Device(_)));
    }
}
