use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::{LocationContext, WeatherContext};
use super::enums::CaptureOrigin;

/// A single acquired image, ready to be streamed to the inference endpoint.
///
/// Consumed exactly once by the upload client; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Local filesystem path (already normalized away from content handles).
    pub source_uri: String,
    pub origin: CaptureOrigin,
}

/// Canonical diagnosis shape every downstream consumer renders.
///
/// Strings and lists are always present (possibly empty). Only
/// `confidence` is optional so that a missing score is never printed as 0%.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub disease_name: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    /// Display-ready URI: annotated data URI from the server, or the local capture.
    pub image_reference: String,
    pub description: String,
    pub chemical_controls: Vec<String>,
    pub biological_controls: Vec<String>,
    pub mechanical_controls: Vec<String>,
    pub note: String,
    /// Anything else the endpoint returned, kept verbatim.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PredictionRecord {
    /// Confidence as a whole percentage, e.g. `0.874` → `87`.
    pub fn confidence_percent(&self) -> Option<u32> {
        self.confidence
            .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    /// Control categories in display order, skipping empty ones.
    pub fn control_sections(&self) -> Vec<(&'static str, &[String])> {
        [
            ("Chemical control", self.chemical_controls.as_slice()),
            ("Biological control", self.biological_controls.as_slice()),
            ("Mechanical control", self.mechanical_controls.as_slice()),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }

    pub fn has_image(&self) -> bool {
        !self.image_reference.trim().is_empty()
    }
}

/// A prediction plus whatever ambient context was known at hydration time.
///
/// This is the unit handed to Share, Report and Chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedResult {
    pub prediction: PredictionRecord,
    pub location: Option<LocationContext>,
    pub weather: Option<WeatherContext>,
}
