//! Transport-agnostic application state.
//!
//! `CoreState` owns every long-lived service the screens talk to. The
//! Tauri shell wraps it in an `Arc` and hands it to each command; tests
//! build one directly against a temp data directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::auth::AuthClient;
use crate::chat::{ChatAssistant, ChatAttachment, ChatExchange};
use crate::config::{self, AppConfig, QualityProbeKind, QUALITY_SAMPLE_INTERVAL, SHARE_REPLY_TIMEOUT};
use crate::context::ContextTracker;
use crate::device::{
    DeviceError, FsContentResolver, LocationProvider, PermissionPrompter, ReportedLocation,
    ShareOutcome,
};
use crate::http::ServiceError;
use crate::models::HydratedResult;
use crate::permissions::PermissionGate;
use crate::pipeline::{
    Acquisition, CapturePipeline, FrameProbe, InferenceClient, QualityMonitor, QualityProbe,
    RandomProxyProbe,
};
use crate::report::{self, ReportError};
use crate::session_store::{SessionStore, StoreError};
use crate::share::{self, ShareBroker};
use crate::teahub::Cart;
use crate::translation::Translator;
use crate::weather::WeatherClient;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Root for storage, staged captures and exported reports.
    pub data_dir: PathBuf,
    store: SessionStore,
    permissions: Arc<PermissionGate>,
    context: Arc<ContextTracker>,
    pipeline: CapturePipeline,
    /// Receives preview frames. Only sampled when the pipeline was built
    /// with [`QualityProbeKind::PreviewFrame`].
    frame_probe: Arc<FrameProbe>,
    /// `None` without an OpenWeather key.
    weather: Option<Arc<WeatherClient>>,
    translator: Translator,
    auth: AuthClient,
    assistant: ChatAssistant,
    cart: Mutex<Cart>,
    /// Share sheets are drawn by the UI once it attaches.
    share: ShareBroker,
    /// Latest background location/weather refresh. A new refresh aborts it.
    context_task: Mutex<Option<JoinHandle<()>>>,
}

impl CoreState {
    /// Build the state under `data_dir`.
    ///
    /// Starts the quality sampler, so it must be called from inside a
    /// tokio runtime.
    pub fn new(
        config: AppConfig,
        data_dir: impl Into<PathBuf>,
        prompter: Arc<dyn PermissionPrompter>,
    ) -> Result<Self, CoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(StoreError::from)?;
        let store = SessionStore::open(data_dir.join("storage.json"))?;

        let permissions = Arc::new(PermissionGate::new(prompter));
        let context = Arc::new(ContextTracker::new());
        let frame_probe = Arc::new(FrameProbe::new());

        let probe: Arc<dyn QualityProbe> = match config.quality_probe {
            QualityProbeKind::RandomProxy => Arc::new(RandomProxyProbe),
            QualityProbeKind::PreviewFrame => frame_probe.clone(),
        };
        let quality = QualityMonitor::start(probe, QUALITY_SAMPLE_INTERVAL);

        let acquisition = Acquisition::new(
            permissions.clone(),
            Arc::new(FsContentResolver),
            data_dir.join("captures"),
        );
        match acquisition.clear_staging() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Cleared staged captures from a previous run"),
            Err(e) => tracing::warn!(error = %e, "Could not clear staged captures"),
        }
        let backend = Arc::new(InferenceClient::new(&config.inference_url)?);
        let pipeline = CapturePipeline::new(acquisition, backend, quality, context.clone());

        let weather = if config.weather_api_key.is_empty() {
            tracing::warn!("No OpenWeather key configured, weather is disabled");
            None
        } else {
            Some(Arc::new(WeatherClient::new(
                &config.weather_url,
                &config.weather_api_key,
            )?))
        };

        tracing::info!(
            data_dir = %data_dir.display(),
            probe = ?config.quality_probe,
            "Core state ready"
        );

        Ok(Self {
            translator: Translator::new(&config.translate_url)?,
            auth: AuthClient::new(&config.auth_url)?,
            assistant: ChatAssistant::new(&config.gemini_url, &config.gemini_api_key)?,
            config,
            data_dir,
            store,
            permissions,
            context,
            pipeline,
            frame_probe,
            weather,
            cart: Mutex::new(Cart::default()),
            share: ShareBroker::new(SHARE_REPLY_TIMEOUT),
            context_task: Mutex::new(None),
        })
    }

    /// State from environment config under the platform data directory.
    pub fn from_env(prompter: Arc<dyn PermissionPrompter>) -> Result<Self, CoreError> {
        Self::new(AppConfig::from_env(), config::app_data_dir(), prompter)
    }

    // ── Services ────────────────────────────────────────────

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn permissions(&self) -> &Arc<PermissionGate> {
        &self.permissions
    }

    pub fn context(&self) -> &Arc<ContextTracker> {
        &self.context
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    pub fn frame_probe(&self) -> &FrameProbe {
        &self.frame_probe
    }

    pub fn weather(&self) -> Result<&WeatherClient, CoreError> {
        self.weather.as_deref().ok_or(CoreError::WeatherDisabled)
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn assistant(&self) -> &ChatAssistant {
        &self.assistant
    }

    pub fn share_broker(&self) -> &ShareBroker {
        &self.share
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    pub fn storage_path(&self) -> &Path {
        self.store.path()
    }

    // ── Cart ────────────────────────────────────────────────

    pub fn cart(&self) -> Result<MutexGuard<'_, Cart>, CoreError> {
        self.cart.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Context refresh ─────────────────────────────────────

    /// Start a background location/weather refresh from `provider`,
    /// replacing any refresh still running.
    pub fn refresh_context(&self, provider: Arc<dyn LocationProvider>) -> Result<(), CoreError> {
        let handle = self.context.spawn_refresh(
            self.permissions.clone(),
            provider,
            self.weather.clone(),
        );
        let mut slot = self.context_task.lock().map_err(|_| CoreError::LockPoisoned)?;
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Screen operations
// ═══════════════════════════════════════════════════════════

/// An exported PDF and what the user did with the share sheet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExport {
    pub path: PathBuf,
    /// `None` when no share sheet could be drawn. The file is still kept.
    pub shared: Option<ShareOutcome>,
}

impl CoreState {
    /// Position from the front end. Starts a background location/weather
    /// refresh.
    pub fn report_location(&self, latitude: f64, longitude: f64) -> Result<(), CoreError> {
        let provider = ReportedLocation::checked(latitude, longitude)?;
        self.refresh_context(Arc::new(provider))
    }

    /// The result on screen, for export and sharing.
    pub fn displayed_result(&self) -> Result<HydratedResult, CoreError> {
        self.pipeline.last_result().ok_or(CoreError::NoResult)
    }

    /// Ask the assistant. With `use_diagnosis` the displayed result, if
    /// any, is sent as context. `None` for an empty question.
    pub async fn ask_assistant(
        &self,
        text: &str,
        image_uri: Option<&str>,
        use_diagnosis: bool,
    ) -> Result<Option<ChatExchange>, CoreError> {
        let attachment = match image_uri {
            Some(uri) => Some(
                ChatAttachment::from_uri(uri)
                    .await
                    .map_err(CoreError::Attachment)?,
            ),
            None => None,
        };
        let diagnosis = use_diagnosis
            .then(|| self.pipeline.last_result())
            .flatten();

        Ok(self
            .assistant
            .exchange(text, diagnosis.as_ref(), attachment.as_ref())
            .await)
    }

    pub fn report_html(&self) -> Result<String, CoreError> {
        let result = self.displayed_result()?;
        Ok(report::render_html(&result, chrono::Utc::now()))
    }

    /// Write the PDF report under [`CoreState::exports_dir`] and offer it
    /// on the share sheet.
    pub async fn export_report(&self) -> Result<ReportExport, CoreError> {
        let result = self.displayed_result()?;
        let path = report::export_report(&result, &self.exports_dir(), chrono::Utc::now())?;
        tracing::info!(path = %path.display(), "Report exported");

        let shared = match share::share_report_file(&self.share, &path).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "Report saved but could not be shared");
                None
            }
        };
        Ok(ReportExport { path, shared })
    }

    /// Share the text summary of the displayed result.
    pub async fn share_result(&self) -> Result<ShareOutcome, CoreError> {
        let result = self.displayed_result()?;
        Ok(share::share_result(&self.share, &result).await?)
    }
}

impl Drop for CoreState {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.context_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// Errors from [`CoreState`] operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,

    #[error("Weather is not configured")]
    WeatherDisabled,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Service setup failed: {0}")]
    Service(#[from] ServiceError),

    #[error("No result to export")]
    NoResult,

    #[error("Could not read image: {0}")]
    Attachment(std::io::Error),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
