//! Permission and location commands.
//!
//! The webview asks the platform itself (`getUserMedia`,
//! `navigator.geolocation`) and reports the verdict here so the gate
//! never prompts twice.

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::models::PermissionKind;
use crate::permissions::PermissionStatus;

fn parse_kind(kind: &str) -> Result<PermissionKind, String> {
    kind.parse::<PermissionKind>().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn record_permission(
    kind: String,
    granted: bool,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), String> {
    state.permissions().record(parse_kind(&kind)?, granted);
    Ok(())
}

#[tauri::command]
pub fn permission_status(
    kind: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<PermissionStatus, String> {
    Ok(state.permissions().status(parse_kind(&kind)?))
}

/// Position from the webview. Starts a background location/weather refresh.
#[tauri::command]
pub fn report_location(
    latitude: f64,
    longitude: f64,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), String> {
    state
        .report_location(latitude, longitude)
        .map_err(|e| e.to_string())
}
