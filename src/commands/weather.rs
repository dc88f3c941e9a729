//! Weather screen commands.

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::models::TemperatureUnit;
use crate::weather::WeatherReport;

/// `unit` is a wire string ("imperial") or a picker label ("Fahrenheit").
#[tauri::command]
pub async fn weather_report(
    latitude: f64,
    longitude: f64,
    unit: Option<String>,
    state: State<'_, Arc<CoreState>>,
) -> Result<WeatherReport, String> {
    let unit = TemperatureUnit::from_choice(unit.as_deref()).map_err(|e| e.to_string())?;
    let client = state.weather().map_err(|e| e.to_string())?;
    client
        .report(latitude, longitude, unit)
        .await
        .map_err(|e| e.to_string())
}
