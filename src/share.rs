//! Plain-text share of a diagnosis, and hand-off of exported reports.
//!
//! The platform sheet is drawn by whoever owns the UI. [`ShareBroker`]
//! turns that into a request/reply exchange: each request is delivered to
//! a [`ShareRequestSink`] and the outcome comes back through
//! [`ShareBroker::resolve`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::device::{DeviceError, ShareOutcome, ShareSheet};
use crate::models::HydratedResult;

pub const SHARE_TITLE: &str = "Plant Disease Detection Result";

/// Deterministic share message. Absent sections are left out entirely.
pub fn share_text(result: &HydratedResult) -> String {
    let prediction = &result.prediction;
    let mut blocks: Vec<String> = Vec::new();

    let mut head = format!("Disease: {}", prediction.disease_name);
    if let Some(pct) = prediction.confidence_percent() {
        head.push_str(&format!("\nConfidence: {pct}%"));
    }
    blocks.push(head);

    if !prediction.description.is_empty() {
        blocks.push(format!("Description: {}", prediction.description));
    }

    let controls = prediction.control_sections();
    if !controls.is_empty() {
        let mut treatments = String::from("Treatments:");
        for (label, items) in controls {
            treatments.push_str(&format!("\n{label}:"));
            for item in items {
                treatments.push_str(&format!("\n- {item}"));
            }
        }
        blocks.push(treatments);
    }

    if !prediction.note.is_empty() {
        blocks.push(format!("Note: {}", prediction.note));
    }

    let mut context = Vec::new();
    if let Some(location) = &result.location {
        context.push(format!("Location: {}", location.display_label()));
    }
    if let Some(weather) = &result.weather {
        context.push(format!("Weather: {}", weather.summary()));
    }
    if !context.is_empty() {
        blocks.push(context.join("\n"));
    }

    blocks.join("\n\n")
}

/// Open the share sheet with the text summary. Dismissal is not an error.
pub async fn share_result(
    sheet: &dyn ShareSheet,
    result: &HydratedResult,
) -> Result<ShareOutcome, DeviceError> {
    let outcome = sheet.share_text(SHARE_TITLE, &share_text(result)).await?;
    tracing::info!(?outcome, "Share sheet closed");
    Ok(outcome)
}

/// Open the share sheet for an exported PDF report.
pub async fn share_report_file(
    sheet: &dyn ShareSheet,
    path: &Path,
) -> Result<ShareOutcome, DeviceError> {
    let outcome = sheet.share_file(path, "application/pdf").await?;
    tracing::info!(?outcome, path = %path.display(), "Report share closed");
    Ok(outcome)
}

// ═══════════════════════════════════════════════════════════
// ShareBroker
// ═══════════════════════════════════════════════════════════

/// One share sheet the UI is asked to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShareRequest {
    #[serde(rename_all = "camelCase")]
    Text {
        id: String,
        title: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        id: String,
        path: String,
        mime_type: String,
    },
}

impl ShareRequest {
    pub fn id(&self) -> &str {
        match self {
            Self::Text { id, .. } | Self::File { id, .. } => id,
        }
    }
}

/// Carries share requests to the UI.
pub trait ShareRequestSink: Send + Sync {
    fn deliver(&self, request: &ShareRequest) -> Result<(), DeviceError>;
}

/// [`ShareSheet`] answered out of band by the UI.
pub struct ShareBroker {
    sink: RwLock<Option<Arc<dyn ShareRequestSink>>>,
    pending: Mutex<HashMap<String, oneshot::Sender<ShareOutcome>>>,
    reply_timeout: Duration,
}

impl ShareBroker {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            sink: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
            reply_timeout,
        }
    }

    /// Connect the UI. Requests made before this fail with `DeviceError::Share`.
    pub fn attach(&self, sink: Arc<dyn ShareRequestSink>) {
        if let Ok(mut slot) = self.sink.write() {
            *slot = Some(sink);
        }
    }

    /// Deliver the user's answer for request `id`. `false` if nothing waits on it.
    pub fn resolve(&self, id: &str, outcome: ShareOutcome) -> bool {
        let waiter = self.pending.lock().ok().and_then(|mut p| p.remove(id));
        match waiter {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                tracing::warn!(id, "Share reply for unknown request");
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn forget(&self, id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(id);
        }
    }

    async fn dispatch(&self, request: ShareRequest) -> Result<ShareOutcome, DeviceError> {
        let sink = self
            .sink
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| DeviceError::Share("no share sheet attached".into()))?;

        let id = request.id().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| DeviceError::Share("share registry poisoned".into()))?
            .insert(id.clone(), tx);

        if let Err(e) = sink.deliver(&request) {
            self.forget(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Ok(ShareOutcome::Dismissed),
            Err(_) => {
                self.forget(&id);
                tracing::info!(id, "Share sheet never answered, treating as dismissed");
                Ok(ShareOutcome::Dismissed)
            }
        }
    }
}

#[async_trait]
impl ShareSheet for ShareBroker {
    async fn share_text(&self, title: &str, message: &str) -> Result<ShareOutcome, DeviceError> {
        self.dispatch(ShareRequest::Text {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            message: message.to_string(),
        })
        .await
    }

    async fn share_file(&self, path: &Path, mime_type: &str) -> Result<ShareOutcome, DeviceError> {
        self.dispatch(ShareRequest::File {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.display().to_string(),
            mime_type: mime_type.to_string(),
        })
        .await
    }
}
