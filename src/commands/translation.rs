//! Label translation for the selected language.

use std::collections::BTreeMap;
use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;

/// Translate a screen's label table into the stored language.
/// Never fails; untranslatable labels come back in English.
#[tauri::command]
pub async fn translate_labels(
    labels: BTreeMap<String, String>,
    state: State<'_, Arc<CoreState>>,
) -> Result<BTreeMap<String, String>, String> {
    let language = state.store().language();
    Ok(state.translator().translate_labels(&labels, language).await)
}
