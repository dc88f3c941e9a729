use serde::{Deserialize, Serialize};

/// Structured address from the device reverse geocoder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl Address {
    /// Comma-joined non-empty parts, street first.
    pub fn one_line(&self) -> String {
        [
            &self.street,
            &self.city,
            &self.region,
            &self.postal_code,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Where the device was when context was gathered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
    pub latitude: f64,
    pub longitude: f64,
    pub reverse_geocode: Option<Address>,
}

impl LocationContext {
    /// Address if geocoded, otherwise the raw coordinates.
    pub fn display_label(&self) -> String {
        match &self.reverse_geocode {
            Some(address) if !address.one_line().is_empty() => address.one_line(),
            _ => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }
}

/// Current conditions at the device location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub temperature_c: f64,
    pub humidity_pct: i64,
    /// Short condition, e.g. `Rain`.
    pub condition_label: String,
    #[serde(default)]
    pub description: String,
    /// Station/city name reported by the weather service.
    #[serde(default)]
    pub location_label: String,
    #[serde(default)]
    pub wind_speed: Option<f64>,
}

impl WeatherContext {
    pub fn summary(&self) -> String {
        let condition = if self.description.is_empty() {
            self.condition_label.clone()
        } else {
            format!("{} ({})", self.condition_label, self.description)
        };
        format!(
            "{:.1}°C, {}% humidity, {}",
            self.temperature_c, self.humidity_pct, condition
        )
    }
}
