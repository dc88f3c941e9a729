//! Inference JSON → [`PredictionRecord`].
//!
//! The endpoint's shape has drifted across model versions. Everything
//! downstream sees one strict record; this is the only place that knows
//! about the variants.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::models::PredictionRecord;

/// Keys tried, in order, for the disease label.
pub const LABEL_KEYS: [&str; 6] = [
    "disease_name",
    "disease",
    "prediction",
    "predicted_class",
    "class",
    "label",
];

const CONFIDENCE_KEYS: [&str; 3] = ["confidence", "score", "probability"];

/// Keys consumed into typed fields; everything else lands in `metadata`.
const KNOWN_KEYS: [&str; 17] = [
    "disease_name",
    "disease",
    "prediction",
    "predicted_class",
    "class",
    "label",
    "predictions",
    "confidence",
    "score",
    "probability",
    "processed_image",
    "description",
    "chemical_control",
    "biological_control",
    "mechanical_control",
    "note",
    "notes",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedPrediction {
    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response carries no disease label")]
    MissingLabel,
}

/// Build a record from a 2xx inference body.
///
/// `capture_uri` is the image reference when the server sends no
/// annotated image.
pub fn normalize_prediction(
    body: &Value,
    capture_uri: &str,
) -> Result<PredictionRecord, MalformedPrediction> {
    let obj = body.as_object().ok_or(MalformedPrediction::NotAnObject)?;
    let first_prediction = obj
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|items| items.first());

    let disease_name = label_from(obj)
        .or_else(|| first_prediction.and_then(label_from_value))
        .ok_or(MalformedPrediction::MissingLabel)?;

    let confidence = confidence_from(obj).or_else(|| {
        first_prediction
            .and_then(Value::as_object)
            .and_then(confidence_from)
    });

    let image_reference = obj
        .get("processed_image")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(to_data_uri)
        .unwrap_or_else(|| capture_uri.to_string());

    let metadata: BTreeMap<String, Value> = obj
        .iter()
        .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()) && !key.ends_with("_controls"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(PredictionRecord {
        disease_name,
        confidence,
        image_reference,
        description: text_field(obj, &["description"]),
        chemical_controls: list_field(obj, "chemical"),
        biological_controls: list_field(obj, "biological"),
        mechanical_controls: list_field(obj, "mechanical"),
        note: text_field(obj, &["note", "notes"]),
        metadata,
    })
}

/// Prefix a bare base64 payload as a JPEG data URI; keep existing data URIs.
pub fn to_data_uri(payload: &str) -> String {
    if payload.starts_with("data:") {
        payload.to_string()
    } else {
        format!("data:image/jpeg;base64,{payload}")
    }
}

fn label_from(obj: &Map<String, Value>) -> Option<String> {
    LABEL_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(non_empty_str)
}

fn label_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => label_from(obj).or_else(|| obj.get("name").and_then(non_empty_str)),
        other => non_empty_str(other),
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Scores in `(1, 100]` are read as percentages.
fn confidence_from(obj: &Map<String, Value>) -> Option<f64> {
    let raw = CONFIDENCE_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))?;

    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let normalized = if raw > 1.0 { raw / 100.0 } else { raw };
    (normalized <= 1.0).then_some(normalized)
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(non_empty_str)
        .unwrap_or_default()
}

/// `<category>_controls` or `<category>_control`; a list or a single string.
fn list_field(obj: &Map<String, Value>, category: &str) -> Vec<String> {
    let value = obj
        .get(&format!("{category}_controls"))
        .or_else(|| obj.get(&format!("{category}_control")));

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(non_empty_str).collect(),
        Some(other) => non_empty_str(other).into_iter().collect(),
        None => Vec::new(),
    }
}
