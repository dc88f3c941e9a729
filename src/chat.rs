//! Tea-care assistant backed by Gemini `generateContent`.
//!
//! Every request is stateless. When a diagnosis is on screen its summary is
//! prepended to the user's text; without one, off-topic questions are
//! answered locally with a canned refusal.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SERVICE_TIMEOUT;
use crate::http::{build_client, map_send_error, read_json, ServiceError};
use crate::device::strip_scheme;
use crate::models::HydratedResult;

pub const OFF_TOPIC_REPLY: &str = "I'm sorry, I only answer questions related to tea leaf diseases.";
pub const EMPTY_REPLY: &str = "Sorry, I could not process your request.";
pub const CONNECTION_ERROR_REPLY: &str =
    "Error connecting to the assistant. Please try again later.";

/// One bubble in the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_bot: bool,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    fn new(text: impl Into<String>, is_bot: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            is_bot,
            sent_at: chrono::Utc::now(),
        }
    }

    pub fn user(text: &str, with_image: bool) -> Self {
        let text = if with_image {
            format!("{text} [Image attached]")
        } else {
            text.to_string()
        };
        Self::new(text, false)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }
}

/// The user's bubble and the reply, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatExchange {
    pub question: ChatMessage,
    pub reply: ChatMessage,
}

/// Image sent inline with a question.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatAttachment {
    pub mime_type: String,
    pub data_base64: String,
}

impl ChatAttachment {
    /// Read an attachment named by a picker URI (`file://`, `content://`
    /// or a plain path).
    pub async fn from_uri(uri: &str) -> std::io::Result<Self> {
        Self::from_path(&strip_scheme(uri)).await
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .filter(|m| m.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        Ok(Self {
            mime_type,
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}

/// Questions must mention tea or leaves unless a diagnosis gives context.
pub fn is_on_topic(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("tea") || lower.contains("leaf")
}

/// Plain-text summary of a diagnosis, prepended to chat questions.
pub fn build_context(result: &HydratedResult) -> String {
    let prediction = &result.prediction;
    let mut lines = vec![
        "Diagnosis context for a tea leaf:".to_string(),
        format!("Disease: {}", prediction.disease_name),
    ];
    if let Some(pct) = prediction.confidence_percent() {
        lines.push(format!("Confidence: {pct}%"));
    }
    if !prediction.description.is_empty() {
        lines.push(format!("Description: {}", prediction.description));
    }
    for (label, items) in prediction.control_sections() {
        lines.push(format!("{label}: {}", items.join("; ")));
    }
    if !prediction.note.is_empty() {
        lines.push(format!("Note: {}", prediction.note));
    }
    if let Some(location) = &result.location {
        lines.push(format!("Location: {}", location.display_label()));
    }
    if let Some(weather) = &result.weather {
        lines.push(format!("Weather: {}", weather.summary()));
    }
    lines.join("\n")
}

pub struct ChatAssistant {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ChatAssistant {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(SERVICE_TIMEOUT)?,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout: SERVICE_TIMEOUT,
        })
    }

    /// Answer one question. Always yields a bot message; failures become
    /// apology text. Returns `None` for an empty question with no image.
    pub async fn ask(
        &self,
        text: &str,
        diagnosis: Option<&HydratedResult>,
        attachment: Option<&ChatAttachment>,
    ) -> Option<ChatMessage> {
        if text.trim().is_empty() && attachment.is_none() {
            return None;
        }

        let prompt = match diagnosis {
            Some(result) => format!("{}\n\nQuestion: {text}", build_context(result)),
            None if !is_on_topic(text) => {
                tracing::debug!("Off-topic chat question answered locally");
                return Some(ChatMessage::bot(OFF_TOPIC_REPLY));
            }
            None => text.to_string(),
        };

        let reply = match self.generate(&prompt, attachment).await {
            Ok(reply) => reply.unwrap_or_else(|| EMPTY_REPLY.to_string()),
            Err(e) => {
                tracing::error!(error = %e, "Assistant request failed");
                CONNECTION_ERROR_REPLY.to_string()
            }
        };
        Some(ChatMessage::bot(reply))
    }

    /// [`ChatAssistant::ask`] paired with the user's own bubble.
    pub async fn exchange(
        &self,
        text: &str,
        diagnosis: Option<&HydratedResult>,
        attachment: Option<&ChatAttachment>,
    ) -> Option<ChatExchange> {
        let reply = self.ask(text, diagnosis, attachment).await?;
        Some(ChatExchange {
            question: ChatMessage::user(text, attachment.is_some()),
            reply,
        })
    }

    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<&ChatAttachment>,
    ) -> Result<Option<String>, ServiceError> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = attachment {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": image.data_base64,
                }
            }));
        }
        let payload = json!({ "contents": [{ "parts": parts }] });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.endpoint, self.timeout))?;

        let body = read_json(response, self.timeout).await?;
        Ok(reply_text(&body))
    }
}

fn reply_text(body: &Value) -> Option<String> {
    let text = body.pointer("/candidates/0/content/parts/0/text")?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PredictionRecord, WeatherContext};
    use crate::test_support::{dead_url, spawn_server};
    use axum::extract::Query;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn diagnosis(confidence: Option<f64>) -> HydratedResult {
        HydratedResult {
            prediction: PredictionRecord {
                disease_name: "Blister Blight".into(),
                confidence,
                chemical_controls: vec!["Copper oxychloride".into(), "Hexaconazole".into()],
                ..Default::default()
            },
            location: None,
            weather: Some(WeatherContext {
                temperature_c: 22.0,
                humidity_pct: 92,
                condition_label: "Rain".into(),
                description: String::new(),
                location_label: String::new(),
                wind_speed: None,
            }),
        }
    }

    async fn gemini(hits: Arc<AtomicUsize>, reply: Value) -> ChatAssistant {
        let app = Router::new().route(
            "/generate",
            post(
                move |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| {
                    let hits = hits.clone();
                    let reply = reply.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(q["key"], "test-key");
                        assert!(body.pointer("/contents/0/parts/0/text").is_some());
                        Json(reply)
                    }
                },
            ),
        );
        let base = spawn_server(app).await;
        ChatAssistant::new(&format!("{base}/generate"), "test-key").unwrap()
    }

    #[test]
    fn context_omits_missing_sections() {
        let context = build_context(&diagnosis(None));
        assert!(context.contains("Disease: Blister Blight"));
        assert!(context.contains("Chemical control: Copper oxychloride; Hexaconazole"));
        assert!(context.contains("Weather: 22.0°C, 92% humidity, Rain"));
        assert!(!context.contains("Confidence"));
        assert!(!context.contains("Location"));
        assert!(!context.contains("Biological"));

        assert!(build_context(&diagnosis(Some(0.91))).contains("Confidence: 91%"));
    }

    #[test]
    fn topic_guard() {
        assert!(is_on_topic("Why are my TEA bushes yellow?"));
        assert!(is_on_topic("spots on the leaf"));
        assert!(!is_on_topic("What's the cricket score?"));
    }

    #[test]
    fn user_bubble_marks_image() {
        assert_eq!(ChatMessage::user("look", true).text, "look [Image attached]");
        assert!(!ChatMessage::user("look", false).is_bot);
    }

    #[tokio::test]
    async fn off_topic_without_diagnosis_is_refused_locally() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bot = gemini(hits.clone(), json!({})).await;
        let reply = bot.ask("Who won the match?", None, None).await.unwrap();
        assert_eq!(reply.text, OFF_TOPIC_REPLY);
        assert!(reply.is_bot);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn diagnosis_context_lifts_topic_guard() {
        let hits = Arc::new(AtomicUsize::new(0));
        let reply = json!({"candidates": [{"content": {"parts": [{"text": "Spray after the rain stops."}]}}]});
        let bot = gemini(hits.clone(), reply).await;

        let answer = bot
            .ask("When should I spray?", Some(&diagnosis(Some(0.9))), None)
            .await
            .unwrap();
        assert_eq!(answer.text, "Spray after the rain stops.");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_candidate_gets_apology() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bot = gemini(hits, json!({"candidates": []})).await;
        let answer = bot.ask("tea blight cure?", None, None).await.unwrap();
        assert_eq!(answer.text, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn unreachable_service_gets_connection_message() {
        let bot = ChatAssistant::new(&dead_url().await, "k").unwrap();
        let answer = bot.ask("tea blight cure?", None, None).await.unwrap();
        assert_eq!(answer.text, CONNECTION_ERROR_REPLY);
    }

    #[tokio::test]
    async fn blank_question_is_ignored() {
        let bot = ChatAssistant::new(&dead_url().await, "k").unwrap();
        assert!(bot.ask("   ", None, None).await.is_none());
    }

    #[tokio::test]
    async fn attachment_is_base64_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, b"abc").unwrap();
        let attachment = ChatAttachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data_base64, "YWJj");
    }

    #[tokio::test]
    async fn exchange_pairs_question_and_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let attachment = ChatAttachment::from_uri(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(attachment.mime_type, "image/jpeg");

        let hits = Arc::new(AtomicUsize::new(0));
        let bot = gemini(
            hits.clone(),
            json!({"candidates": [{"content": {"parts": [{"text": "Prune and spray."}]}}]}),
        )
        .await;
        let exchange = bot
            .exchange("What now for this leaf?", None, Some(&attachment))
            .await
            .unwrap();
        assert_eq!(exchange.question.text, "What now for this leaf? [Image attached]");
        assert!(!exchange.question.is_bot);
        assert_eq!(exchange.reply.text, "Prune and spray.");
        assert!(exchange.reply.is_bot);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(bot.exchange("", None, None).await.is_none());
    }
}
