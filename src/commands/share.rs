//! Share sheet bridge.
//!
//! The core asks for a sheet by emitting `share-request`; the webview
//! draws it and answers through [`resolve_share`].

use std::sync::Arc;

use tauri::{AppHandle, Emitter, State};

use crate::core_state::CoreState;
use crate::device::{DeviceError, ShareOutcome};
use crate::share::{ShareRequest, ShareRequestSink};

pub const SHARE_REQUEST_EVENT: &str = "share-request";

/// Forwards share requests to the webview as events.
pub struct TauriShareSink {
    app: AppHandle,
}

impl TauriShareSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ShareRequestSink for TauriShareSink {
    fn deliver(&self, request: &ShareRequest) -> Result<(), DeviceError> {
        self.app
            .emit(SHARE_REQUEST_EVENT, request)
            .map_err(|e| DeviceError::Share(e.to_string()))
    }
}

/// Share the displayed result as text.
#[tauri::command]
pub async fn share_result(state: State<'_, Arc<CoreState>>) -> Result<ShareOutcome, String> {
    state.share_result().await.map_err(|e| e.to_string())
}

/// The webview's answer to a `share-request` event.
#[tauri::command]
pub fn resolve_share(id: String, outcome: ShareOutcome, state: State<'_, Arc<CoreState>>) -> bool {
    state.share_broker().resolve(&id, outcome)
}
