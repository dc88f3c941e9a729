//! UI label translation through the MyMemory API.
//!
//! Translation is best-effort: English never hits the network, and any
//! failure returns the English text unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;

use crate::config::SERVICE_TIMEOUT;
use crate::http::{build_client, map_send_error, read_json, ServiceError};
use crate::models::Language;

pub struct Translator {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    cache: RwLock<HashMap<(Language, String), String>>,
}

impl Translator {
    pub fn new(endpoint: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(SERVICE_TIMEOUT)?,
            endpoint: endpoint.to_string(),
            timeout: SERVICE_TIMEOUT,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Translate `text` from English, falling back to `text` itself.
    pub async fn translate(&self, text: &str, target: Language) -> String {
        if target == Language::English || text.trim().is_empty() {
            return text.to_string();
        }

        let key = (target, text.to_string());
        if let Some(hit) = self.cache.read().ok().and_then(|c| c.get(&key).cloned()) {
            return hit;
        }

        match self.fetch(text, target).await {
            Ok(translated) => {
                if let Ok(mut cache) = self.cache.write() {
                    cache.insert(key, translated.clone());
                }
                translated
            }
            Err(e) => {
                tracing::warn!(lang = %target, error = %e, "Translation failed, keeping English");
                text.to_string()
            }
        }
    }

    /// Translate every value of a label table concurrently. Keys are kept.
    pub async fn translate_labels(
        &self,
        labels: &BTreeMap<String, String>,
        target: Language,
    ) -> BTreeMap<String, String> {
        let translated = join_all(labels.values().map(|text| self.translate(text, target))).await;
        labels.keys().cloned().zip(translated).collect()
    }

    async fn fetch(&self, text: &str, target: Language) -> Result<String, ServiceError> {
        let langpair = format!("en|{}", target.as_str());
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.endpoint, self.timeout))?;

        let body = read_json(response, self.timeout).await?;
        extract_translation(&body)
    }
}

/// `responseData.translatedText`, rejecting in-band errors and blanks.
fn extract_translation(body: &Value) -> Result<String, ServiceError> {
    // MyMemory reports quota and language-pair errors with HTTP 200.
    let status = body.get("responseStatus").and_then(|v| match v {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        other => other.as_i64(),
    });
    if let Some(status) = status {
        if status != 200 {
            return Err(ServiceError::Server {
                status: u16::try_from(status).unwrap_or(500),
                message: body
                    .get("responseDetails")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }

    body.pointer("/responseData/translatedText")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::MalformedResponse("missing translatedText".into()))
}
