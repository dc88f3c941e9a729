//! Result export commands: HTML preview and the shared PDF file.

use std::sync::Arc;

use tauri::State;

use crate::core_state::{CoreState, ReportExport};

#[tauri::command]
pub fn report_html(state: State<'_, Arc<CoreState>>) -> Result<String, String> {
    state.report_html().map_err(|e| e.to_string())
}

/// Write the PDF report and offer it on the share sheet.
#[tauri::command]
pub async fn export_report_pdf(state: State<'_, Arc<CoreState>>) -> Result<ReportExport, String> {
    state.export_report().await.map_err(|e| e.to_string())
}
