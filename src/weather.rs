//! OpenWeatherMap client: current conditions, 4-day summary, spraying advisory.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SERVICE_TIMEOUT;
use crate::http::{build_client, map_send_error, read_json, ServiceError};
use crate::models::{TemperatureUnit, WeatherContext};

/// Days shown on the forecast screen.
pub const FORECAST_DAYS: usize = 4;

pub const GOOD_SPRAY_DAY: &str = "Today is a good day to apply pesticides.";
pub const POOR_SPRAY_DAY: &str = "Today may not be ideal for pesticides. Check conditions.";

// ── Wire shapes ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    #[serde(default)]
    name: String,
    main: OwmMain,
    wind: Option<OwmWind>,
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt_txt: String,
    main: OwmMain,
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmForecastItem>,
}

// ── Public shapes ───────────────────────────────────────────

/// Current conditions in the requested unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub humidity_pct: i64,
    pub condition_label: String,
    pub description: String,
    pub location_label: String,
    pub wind_speed: Option<f64>,
    pub unit: TemperatureUnit,
    pub icon: &'static str,
}

impl CurrentWeather {
    pub fn temperature_c(&self) -> f64 {
        to_celsius(self.temperature, self.unit)
    }

    pub fn to_context(&self) -> WeatherContext {
        WeatherContext {
            temperature_c: self.temperature_c(),
            humidity_pct: self.humidity_pct,
            condition_label: self.condition_label.clone(),
            description: self.description.clone(),
            location_label: self.location_label.clone(),
            wind_speed: self.wind_speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    /// Condition of the middle sample of the day.
    pub condition_label: String,
    pub avg_temp: f64,
    pub avg_humidity: f64,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SprayingAdvisory {
    pub suitable: bool,
    pub message: &'static str,
}

/// Everything the weather screen draws in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub current: CurrentWeather,
    /// "C", "F" or "K" for the temperatures in this report.
    pub unit_symbol: &'static str,
    pub advisory: SprayingAdvisory,
    /// Empty when only the forecast call failed.
    pub forecast: Vec<DailyForecast>,
}

/// Icon name for an OpenWeatherMap `weather[0].main` value.
pub fn icon_name(condition: &str) -> &'static str {
    match condition {
        "Clear" => "weather-sunny",
        "Clouds" => "weather-cloudy",
        "Rain" => "weather-rainy",
        "Snow" => "weather-snowy",
        "Thunderstorm" => "weather-lightning",
        "Drizzle" => "weather-pouring",
        _ => "weather-partly-cloudy",
    }
}

fn to_celsius(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Metric => value,
        TemperatureUnit::Imperial => (value - 32.0) * 5.0 / 9.0,
        TemperatureUnit::Standard => value - 273.15,
    }
}

/// Pesticide spraying is advised when it is dry, calm, mild and not humid:
/// no rain or drizzle, wind < 5, 15 °C ≤ temp ≤ 30 °C, humidity < 90%.
pub fn spraying_advisory(current: &CurrentWeather) -> SprayingAdvisory {
    let condition = current.condition_label.to_lowercase();
    let dry = !condition.contains("rain") && !condition.contains("drizzle");
    let calm = current.wind_speed.map_or(true, |speed| speed < 5.0);
    let temp = current.temperature_c();
    let mild = (15.0..=30.0).contains(&temp);
    let humid = current.humidity_pct >= 90;

    let suitable = dry && calm && mild && !humid;
    SprayingAdvisory {
        suitable,
        message: if suitable { GOOD_SPRAY_DAY } else { POOR_SPRAY_DAY },
    }
}

/// Group 3-hourly samples by calendar day, keep days from `today` on and
/// return the first [`FORECAST_DAYS`] in date order.
fn summarize_forecast(items: &[OwmForecastItem], today: NaiveDate) -> Vec<DailyForecast> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&OwmForecastItem>> = BTreeMap::new();
    for item in items {
        let day = item.dt_txt.split(' ').next().unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            tracing::debug!(dt_txt = %item.dt_txt, "Skipping forecast sample with bad date");
            continue;
        };
        by_day.entry(date).or_default().push(item);
    }

    by_day
        .into_iter()
        .filter(|(date, _)| *date >= today)
        .take(FORECAST_DAYS)
        .map(|(date, samples)| {
            let n = samples.len() as f64;
            let avg_temp = samples.iter().map(|s| s.main.temp).sum::<f64>() / n;
            let avg_humidity = samples.iter().map(|s| s.main.humidity).sum::<f64>() / n;
            let condition_label = samples[samples.len() / 2]
                .weather
                .first()
                .map(|w| w.main.clone())
                .unwrap_or_default();
            DailyForecast {
                date,
                icon: icon_name(&condition_label),
                condition_label,
                avg_temp,
                avg_humidity,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════

pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(SERVICE_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: SERVICE_TIMEOUT,
        })
    }

    pub async fn current(
        &self,
        latitude: f64,
        longitude: f64,
        unit: TemperatureUnit,
    ) -> Result<CurrentWeather, ServiceError> {
        let body: OwmCurrent = self.get("weather", latitude, longitude, unit).await?;
        let condition = body
            .weather
            .first()
            .ok_or_else(|| ServiceError::MalformedResponse("weather array is empty".into()))?;

        Ok(CurrentWeather {
            temperature: body.main.temp,
            humidity_pct: body.main.humidity.round() as i64,
            condition_label: condition.main.clone(),
            description: condition.description.clone(),
            location_label: body.name,
            wind_speed: body.wind.map(|w| w.speed),
            unit,
            icon: icon_name(&condition.main),
        })
    }

    pub async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        unit: TemperatureUnit,
    ) -> Result<Vec<DailyForecast>, ServiceError> {
        let body: OwmForecast = self.get("forecast", latitude, longitude, unit).await?;
        let today = chrono::Utc::now().date_naive();
        Ok(summarize_forecast(&body.list, today))
    }

    /// Current weather, advisory and forecast fetched together. Only a
    /// failed current-weather call fails the report.
    pub async fn report(
        &self,
        latitude: f64,
        longitude: f64,
        unit: TemperatureUnit,
    ) -> Result<WeatherReport, ServiceError> {
        let (current, forecast) = tokio::join!(
            self.current(latitude, longitude, unit),
            self.forecast(latitude, longitude, unit),
        );
        let current = current?;
        let forecast = forecast.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Forecast unavailable, showing current weather only");
            Vec::new()
        });

        Ok(WeatherReport {
            unit_symbol: unit.symbol(),
            advisory: spraying_advisory(&current),
            current,
            forecast,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        latitude: f64,
        longitude: f64,
        unit: TemperatureUnit,
    ) -> Result<T, ServiceError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("units", unit.as_str().to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout))?;

        let value = read_json(response, self.timeout).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::error!(kind = "malformed_response", endpoint, error = %e, "Weather reply rejected");
            ServiceError::MalformedResponse(e.to_string())
        })
    }
}
