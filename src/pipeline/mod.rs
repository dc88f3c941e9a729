//! Capture-to-result pipeline.
//!
//! Acquisition → quality (advisory) → upload/inference → hydration. Each
//! stage lives in its own module; [`orchestrator::CapturePipeline`] runs
//! them in strict order for one attempt and turns every failure into a
//! [`UserAlert`] at the boundary.

pub mod acquisition;
pub mod hydrate;
pub mod inference;
pub mod normalize;
pub mod orchestrator;
pub mod quality;

pub use acquisition::Acquisition;
pub use hydrate::{hydrate, rehydrate};
pub use inference::{InferenceBackend, InferenceClient};
pub use orchestrator::{CaptureOutcome, CapturePipeline, CaptureStatus};
pub use quality::{FixedProbe, FrameProbe, QualityMonitor, QualityProbe, RandomProxyProbe};

use serde::Serialize;

use crate::device::DeviceError;
use crate::http::ServiceError;
use crate::models::PermissionKind;

pub const PROCESS_FAILED_MESSAGE: &str = "Failed to process image. Please try again.";
pub const LOW_QUALITY_TITLE: &str = "Low Quality";
pub const LOW_QUALITY_MESSAGE: &str =
    "The image quality appears to be poor. Please retake the photo in better lighting or focus.";

/// Everything that can stop a capture attempt.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(PermissionKind),

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Inference server returned {status}")]
    Server { status: u16, message: Option<String> },

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<ServiceError> for CaptureError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Server { status, message } => Self::Server { status, message },
            ServiceError::MalformedResponse(detail) => Self::MalformedResponse(detail),
            other => Self::Network(other.to_string()),
        }
    }
}

/// A modal alert as the screen shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAlert {
    pub title: String,
    pub message: String,
    /// The same action may succeed if simply tried again.
    pub retryable: bool,
}

impl UserAlert {
    pub fn new(title: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub fn low_quality() -> Self {
        Self::new(LOW_QUALITY_TITLE, LOW_QUALITY_MESSAGE, true)
    }
}

impl CaptureError {
    /// The alert to show, or `None` for silent outcomes (user cancellation).
    pub fn user_alert(&self) -> Option<UserAlert> {
        let alert = match self {
            Self::Cancelled => return None,
            Self::PermissionDenied(kind) => UserAlert::new(
                "Permission Denied",
                match kind {
                    PermissionKind::Camera => "Permission to access camera was denied",
                    PermissionKind::Gallery => "Permission to access gallery was denied",
                    PermissionKind::Location => "Permission to access location was denied",
                },
                false,
            ),
            Self::Network(_) => UserAlert::new("Error", PROCESS_FAILED_MESSAGE, true),
            Self::Server { message, .. } => UserAlert::new(
                "Error",
                message.as_deref().unwrap_or(PROCESS_FAILED_MESSAGE),
                false,
            ),
            Self::MalformedResponse(_) | Self::Device(_) => {
                UserAlert::new("Error", PROCESS_FAILED_MESSAGE, false)
            }
        };
        Some(alert)
    }
}

/// Where a capture attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Acquiring,
    QualityCheck,
    Uploading,
    Hydrating,
    Displayed,
}
