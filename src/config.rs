use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Camellia";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upload/inference requests are abandoned after this long. No automatic retry.
pub const INFERENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the lighter JSON services (weather, translation, auth, chat).
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(15);

/// An unanswered share request counts as dismissed after this long.
pub const SHARE_REPLY_TIMEOUT: Duration = Duration::from_secs(300);

/// How often the capture-quality label is recomputed.
pub const QUALITY_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000/yolo-v11/";
const DEFAULT_AUTH_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";
const DEFAULT_TRANSLATE_URL: &str = "https://api.mymemory.translated.net/get";
const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "camellia_lib=info,warn"
}

/// Get the application data directory.
///
/// `CAMELLIA_DATA_DIR` wins; otherwise the platform data dir
/// (app-private on mobile), falling back to the working directory.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("CAMELLIA_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Which signal drives the capture-quality label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityProbeKind {
    /// Random light/focus proxies, the historical heuristic.
    RandomProxy,
    /// Brightness and sharpness of frames pushed by the preview.
    PreviewFrame,
}

impl QualityProbeKind {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "frame" | "preview" => Self::PreviewFrame,
            _ => Self::RandomProxy,
        }
    }
}

/// Endpoints and keys for every external collaborator.
///
/// Resolution order: environment variable, then built-in default.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub inference_url: String,
    pub auth_url: String,
    pub weather_url: String,
    pub weather_api_key: String,
    pub translate_url: String,
    pub gemini_url: String,
    pub gemini_api_key: String,
    pub quality_probe: QualityProbeKind,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            inference_url: env_or("CAMELLIA_INFERENCE_URL", DEFAULT_INFERENCE_URL),
            auth_url: env_or("CAMELLIA_AUTH_URL", DEFAULT_AUTH_URL),
            weather_url: env_or("CAMELLIA_WEATHER_URL", DEFAULT_WEATHER_URL),
            weather_api_key: env_or("OPENWEATHER_API_KEY", ""),
            translate_url: env_or("CAMELLIA_TRANSLATE_URL", DEFAULT_TRANSLATE_URL),
            gemini_url: env_or("CAMELLIA_GEMINI_URL", DEFAULT_GEMINI_URL),
            gemini_api_key: env_or("GEMINI_API_KEY", ""),
            quality_probe: QualityProbeKind::parse(&env_or("CAMELLIA_QUALITY_PROBE", "random")),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
