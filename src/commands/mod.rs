//! Tauri IPC surface. Every command is a thin adapter over [`CoreState`]:
//! parse arguments, call the library, map errors to `String`.

pub mod capture;
pub mod chat;
pub mod permissions;
pub mod report;
pub mod session;
pub mod share;
pub mod teahub;
pub mod translation;
pub mod weather;

use std::sync::Arc;

use tauri::State;

use crate::config;
use crate::core_state::CoreState;

/// Health check IPC command, verifies the backend is running.
#[tauri::command]
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}

/// Static facts the front end shows in its about box.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub weather_enabled: bool,
}

#[tauri::command]
pub fn app_info(state: State<'_, Arc<CoreState>>) -> AppInfo {
    AppInfo {
        name: config::APP_NAME,
        version: config::APP_VERSION,
        weather_enabled: state.weather().is_ok(),
    }
}
