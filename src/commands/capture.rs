//! Capture screen commands.
//!
//! The webview owns the camera preview and the file input. It hands the
//! chosen image over by URI; everything after that runs in
//! [`crate::pipeline::CapturePipeline`].

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::device::HandoffImage;
use crate::models::{CaptureOrigin, HydratedResult};
use crate::pipeline::{CaptureOutcome, CaptureStatus};

/// Run one capture attempt. `uri` is `None` when the picker was dismissed.
#[tauri::command]
pub async fn start_capture(
    origin: String,
    uri: Option<String>,
    state: State<'_, Arc<CoreState>>,
) -> Result<CaptureOutcome, String> {
    let origin = origin
        .parse::<CaptureOrigin>()
        .map_err(|e| e.to_string())?;
    let source = HandoffImage::new(uri);
    Ok(state.pipeline().run(origin, &source).await)
}

/// The capture screen is going away; late results are dropped.
#[tauri::command]
pub fn detach_capture(state: State<'_, Arc<CoreState>>) {
    state.pipeline().detach();
}

#[tauri::command]
pub fn capture_status(state: State<'_, Arc<CoreState>>) -> CaptureStatus {
    state.pipeline().status()
}

/// Push an encoded preview frame (base64 JPEG/PNG) for quality sampling.
#[tauri::command]
pub fn submit_preview_frame(
    frame_base64: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), String> {
    state
        .frame_probe()
        .submit_base64(&frame_base64)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn last_result(state: State<'_, Arc<CoreState>>) -> Option<HydratedResult> {
    state.pipeline().last_result()
}

/// Re-attach the newest location and weather to the displayed result.
#[tauri::command]
pub fn rehydrate_result(state: State<'_, Arc<CoreState>>) -> Option<HydratedResult> {
    state.pipeline().rehydrate_last()
}
