//! Merge a prediction with whatever context is known right now.

use crate::context::ContextSnapshot;
use crate::models::{HydratedResult, PredictionRecord};

/// Attach the current snapshot. Missing context stays absent.
pub fn hydrate(prediction: PredictionRecord, context: &ContextSnapshot) -> HydratedResult {
    HydratedResult {
        prediction,
        location: context.location.clone(),
        weather: context.weather.clone(),
    }
}

/// Re-attach newer context to an already displayed result. A slot that is
/// empty in `context` keeps its previous value.
pub fn rehydrate(result: HydratedResult, context: &ContextSnapshot) -> HydratedResult {
    HydratedResult {
        location: context.location.clone().or(result.location),
        weather: context.weather.clone().or(result.weather),
        prediction: result.prediction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationContext, WeatherContext};

    fn prediction() -> PredictionRecord {
        PredictionRecord {
            disease_name: "Red Rust".into(),
            ..Default::default()
        }
    }

    fn weather() -> WeatherContext {
        WeatherContext {
            temperature_c: 26.0,
            humidity_pct: 75,
            condition_label: "Clear".into(),
            description: String::new(),
            location_label: String::new(),
            wind_speed: None,
        }
    }

    #[test]
    fn empty_context_hydrates_without_fields() {
        let result = hydrate(prediction(), &ContextSnapshot::default());
        assert_eq!(result.prediction.disease_name, "Red Rust");
        assert!(result.location.is_none());
        assert!(result.weather.is_none());
    }

    #[test]
    fn rehydrate_fills_late_weather_and_keeps_location() {
        let location = LocationContext {
            latitude: 26.75,
            longitude: 94.21,
            reverse_geocode: None,
        };
        let first = hydrate(
            prediction(),
            &ContextSnapshot {
                location: Some(location.clone()),
                weather: None,
            },
        );

        let later = ContextSnapshot {
            location: None,
            weather: Some(weather()),
        };
        let result = rehydrate(first, &later);
        assert_eq!(result.location, Some(location));
        assert_eq!(result.weather, Some(weather()));
    }
}
