//! Permission gate for camera, gallery and location access.
//!
//! The OS prompt is shown at most once per kind per session; later
//! requests return the cached decision. A denial only disables the
//! dependent feature, it is never fatal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::device::PermissionPrompter;
use crate::models::PermissionKind;

/// What the gate currently knows about one permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Undetermined,
    Granted,
    Denied,
}

pub struct PermissionGate {
    prompter: Arc<dyn PermissionPrompter>,
    decisions: RwLock<HashMap<PermissionKind, bool>>,
    /// Serializes prompts so two concurrent requests never double-prompt.
    prompt_lock: tokio::sync::Mutex<()>,
}

impl PermissionGate {
    pub fn new(prompter: Arc<dyn PermissionPrompter>) -> Self {
        Self {
            prompter,
            decisions: RwLock::new(HashMap::new()),
            prompt_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Ask for `kind`, prompting only if no decision is cached.
    pub async fn request(&self, kind: PermissionKind) -> bool {
        if let Some(granted) = self.cached(kind) {
            return granted;
        }

        let _prompting = self.prompt_lock.lock().await;
        if let Some(granted) = self.cached(kind) {
            return granted;
        }

        let granted = self.prompter.prompt(kind).await;
        self.record(kind, granted);
        granted
    }

    /// Store a decision obtained elsewhere (e.g. reported by the webview).
    pub fn record(&self, kind: PermissionKind, granted: bool) {
        if let Ok(mut decisions) = self.decisions.write() {
            decisions.insert(kind, granted);
        }
        if granted {
            tracing::info!(permission = %kind, "Permission granted");
        } else {
            tracing::warn!(permission = %kind, "Permission denied, feature disabled for this session");
        }
    }

    pub fn status(&self, kind: PermissionKind) -> PermissionStatus {
        match self.cached(kind) {
            None => PermissionStatus::Undetermined,
            Some(true) => PermissionStatus::Granted,
            Some(false) => PermissionStatus::Denied,
        }
    }

    fn cached(&self, kind: PermissionKind) -> Option<bool> {
        self.decisions.read().ok()?.get(&kind).copied()
    }
}
