//! Assistant chat command.

use std::sync::Arc;

use tauri::State;

use crate::chat::ChatExchange;
use crate::core_state::CoreState;

/// Ask the assistant. Returns `None` for an empty question.
#[tauri::command]
pub async fn ask_assistant(
    text: String,
    image_uri: Option<String>,
    use_diagnosis: bool,
    state: State<'_, Arc<CoreState>>,
) -> Result<Option<ChatExchange>, String> {
    state
        .ask_assistant(&text, image_uri.as_deref(), use_diagnosis)
        .await
        .map_err(|e| e.to_string())
}
