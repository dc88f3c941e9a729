//! Shared HTTP plumbing for the external JSON services.
//!
//! Every collaborator (inference, weather, translation, auth, chat) goes
//! through the same error mapping so screens see one taxonomy:
//! connectivity, timeout, non-2xx with the server's own message, or a
//! 2xx body that does not match the expected shape.

use std::time::Duration;

use serde_json::Value;

/// Errors from an external HTTP service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Cannot reach {0}")]
    Connection(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server returned status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    #[error("Unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ServiceError {
    /// The message the server supplied, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Build a `reqwest` client with a fixed overall timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::HttpClient(e.to_string()))
}

/// Classify a transport-level `reqwest` failure.
pub fn map_send_error(e: reqwest::Error, target: &str, timeout: Duration) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(timeout)
    } else if e.is_connect() || e.is_request() {
        ServiceError::Connection(target.to_string())
    } else if e.is_decode() || e.is_body() {
        ServiceError::MalformedResponse(e.to_string())
    } else {
        ServiceError::HttpClient(e.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ".."}`, `{"detail": ".."}`, `{"error": ".."}` and
/// `{"error": {"message": ".."}}`. Plain-text bodies are ignored.
pub fn extract_server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = value
        .get("message")
        .or_else(|| value.get("detail"))
        .or_else(|| value.get("error"))?;

    let text = match candidate {
        Value::String(s) => s.clone(),
        Value::Object(map) => map.get("message")?.as_str()?.to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Check status, then parse the body as JSON.
pub async fn read_json(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<Value, ServiceError> {
    let status = response.status();
    let target = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| map_send_error(e, &target, timeout))?;

    if !status.is_success() {
        return Err(ServiceError::Server {
            status: status.as_u16(),
            message: extract_server_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_from_plain_field() {
        let body = r#"{"message": "Phone already registered"}"#;
        assert_eq!(
            extract_server_message(body).as_deref(),
            Some("Phone already registered")
        );
    }

    #[test]
    fn message_from_fastapi_detail() {
        let body = r#"{"detail": "Unsupported file"}"#;
        assert_eq!(extract_server_message(body).as_deref(), Some("Unsupported file"));
    }

    #[test]
    fn message_from_nested_error() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(extract_server_message(body).as_deref(), Some("API key not valid"));
    }

    #[test]
    fn non_json_body_has_no_message() {
        assert!(extract_server_message("<html>502</html>").is_none());
        assert!(extract_server_message(r#"{"message": "   "}"#).is_none());
    }

    #[test]
    fn timeout_display_keeps_sub_second_precision() {
        assert_eq!(
            ServiceError::Timeout(Duration::from_millis(200)).to_string(),
            "Request timed out after 200ms"
        );
        assert_eq!(
            ServiceError::Timeout(Duration::from_secs(10)).to_string(),
            "Request timed out after 10s"
        );
    }

    #[test]
    fn server_error_display_includes_message() {
        let err = ServiceError::Server {
            status: 409,
            message: Some("Phone already registered".into()),
        };
        assert!(err.to_string().contains("409"));
        assert_eq!(err.server_message(), Some("Phone already registered"));
    }
}
