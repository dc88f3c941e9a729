//! One capture attempt, start to finish.
//!
//! ```text
//! Idle → Acquiring → QualityCheck{pass→Uploading, fail→Idle(prompt)}
//!      → Uploading{ok→Hydrating, err→Idle(alert)} → Hydrating → Displayed
//! ```
//!
//! At most one attempt runs at a time. A trigger while one is pending
//! returns [`CaptureOutcome::Busy`] without touching the device or the
//! network.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::context::ContextTracker;
use crate::device::ImageSource;
use crate::models::{CaptureOrigin, HydratedResult, QualityLabel};

use super::acquisition::Acquisition;
use super::hydrate::{hydrate, rehydrate};
use super::inference::InferenceBackend;
use super::quality::QualityMonitor;
use super::{CaptureError, CaptureState, UserAlert};

/// How a capture attempt ended, as the screen needs to know it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "payload", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Displayed(HydratedResult),
    /// Camera frame judged poor; nothing was uploaded.
    RetakePrompt(UserAlert),
    /// User dismissed the picker. Nothing to show.
    Cancelled,
    PermissionDenied(UserAlert),
    Failed(UserAlert),
    /// Another attempt is still pending.
    Busy,
    /// The screen detached while this attempt was in flight.
    Discarded,
}

/// Snapshot the capture screen polls to draw its controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub busy: bool,
    pub quality: QualityLabel,
}

pub struct CapturePipeline {
    acquisition: Acquisition,
    backend: Arc<dyn InferenceBackend>,
    quality: QualityMonitor,
    context: Arc<ContextTracker>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    state: RwLock<CaptureState>,
    last_result: RwLock<Option<HydratedResult>>,
}

impl CapturePipeline {
    pub fn new(
        acquisition: Acquisition,
        backend: Arc<dyn InferenceBackend>,
        quality: QualityMonitor,
        context: Arc<ContextTracker>,
    ) -> Self {
        Self {
            acquisition,
            backend,
            quality,
            context,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state: RwLock::new(CaptureState::Idle),
            last_result: RwLock::new(None),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(CaptureState::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn quality_label(&self) -> QualityLabel {
        self.quality.current_quality_label()
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.state(),
            busy: self.is_busy(),
            quality: self.quality_label(),
        }
    }

    /// The screen went away. Attempts already in flight finish in the
    /// background and report [`CaptureOutcome::Discarded`].
    pub fn detach(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "Capture screen detached");
    }

    pub fn last_result(&self) -> Option<HydratedResult> {
        self.last_result.read().ok()?.clone()
    }

    /// Re-attach the newest context to the displayed result.
    pub fn rehydrate_last(&self) -> Option<HydratedResult> {
        let mut slot = self.last_result.write().ok()?;
        let current = slot.take()?;
        let refreshed = rehydrate(current, &self.context.snapshot());
        *slot = Some(refreshed.clone());
        Some(refreshed)
    }

    /// Run one attempt from `source`.
    pub async fn run(&self, origin: CaptureOrigin, source: &dyn ImageSource) -> CaptureOutcome {
        let Some(_slot) = InFlightSlot::try_acquire(&self.in_flight) else {
            tracing::info!(%origin, "Capture ignored, another attempt is pending");
            return CaptureOutcome::Busy;
        };
        let generation = self.generation.load(Ordering::Acquire);

        self.set_state(CaptureState::Acquiring);
        let acquired = match origin {
            CaptureOrigin::Camera => self.acquisition.capture_from_camera(source).await,
            CaptureOrigin::Gallery => self.acquisition.pick_from_gallery(source).await,
        };
        let capture = match acquired {
            Ok(capture) => capture,
            Err(e) => return self.finish_with_error(e),
        };

        if origin == CaptureOrigin::Camera {
            self.set_state(CaptureState::QualityCheck);
            if self.quality.current_quality_label() == QualityLabel::Poor {
                tracing::info!("Capture rejected by quality check, asking for retake");
                self.set_state(CaptureState::Idle);
                return CaptureOutcome::RetakePrompt(UserAlert::low_quality());
            }
        }

        self.set_state(CaptureState::Uploading);
        let submitted = self.backend.submit(&capture).await;

        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(%origin, "Discarding capture result for detached screen");
            self.set_state(CaptureState::Idle);
            return CaptureOutcome::Discarded;
        }

        let prediction = match submitted {
            Ok(prediction) => prediction,
            Err(e) => return self.finish_with_error(e),
        };

        self.set_state(CaptureState::Hydrating);
        let result = hydrate(prediction, &self.context.snapshot());
        if let Ok(mut slot) = self.last_result.write() {
            *slot = Some(result.clone());
        }
        self.set_state(CaptureState::Displayed);
        CaptureOutcome::Displayed(result)
    }

    fn finish_with_error(&self, err: CaptureError) -> CaptureOutcome {
        self.set_state(CaptureState::Idle);
        match (&err, err.user_alert()) {
            (CaptureError::Cancelled, _) | (_, None) => {
                tracing::debug!("Capture cancelled by user");
                CaptureOutcome::Cancelled
            }
            (CaptureError::PermissionDenied(_), Some(alert)) => {
                CaptureOutcome::PermissionDenied(alert)
            }
            (_, Some(alert)) => {
                tracing::warn!(error = %err, retryable = alert.retryable, "Capture failed");
                CaptureOutcome::Failed(alert)
            }
        }
    }

    fn set_state(&self, next: CaptureState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// InFlightSlot: RAII single-flight token
// ═══════════════════════════════════════════════════════════

/// Held for the whole attempt, across awaits. Dropping it frees the slot,
/// including when the attempt's future is dropped mid-flight.
struct InFlightSlot<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightSlot<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
