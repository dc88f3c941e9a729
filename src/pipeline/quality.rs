//! Capture-quality heuristic.
//!
//! A background task samples a [`QualityProbe`] on a fixed interval and
//! publishes the latest `good|poor` label. The label is advisory: it only
//! gates camera captures, and only by asking the user to retake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::Engine;
use image::GrayImage;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::models::QualityLabel;

/// Light proxy below this (0-100) reads as poor.
pub const MIN_LIGHT: f64 = 20.0;
/// Focus proxy below this (0-100) reads as poor.
pub const MIN_FOCUS: f64 = 30.0;

/// Anything that can rate the current preview.
pub trait QualityProbe: Send + Sync {
    fn sample(&self) -> QualityLabel;
}

/// Apply the light/focus thresholds to two 0-100 proxies.
pub fn classify(light: f64, focus: f64) -> QualityLabel {
    if light < MIN_LIGHT || focus < MIN_FOCUS {
        QualityLabel::Poor
    } else {
        QualityLabel::Good
    }
}

// ═══════════════════════════════════════════════════════════
// Probes
// ═══════════════════════════════════════════════════════════

/// Uniform random proxies. Roughly 44% of samples read as poor.
pub struct RandomProxyProbe;

impl QualityProbe for RandomProxyProbe {
    fn sample(&self) -> QualityLabel {
        let mut rng = rand::thread_rng();
        let light = rng.gen_range(0.0..100.0);
        let focus = rng.gen_range(0.0..100.0);
        classify(light, focus)
    }
}

/// Always returns the same label.
pub struct FixedProbe(pub QualityLabel);

impl QualityProbe for FixedProbe {
    fn sample(&self) -> QualityLabel {
        self.0
    }
}

/// A preview frame that could not be taken in.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid frame encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Unreadable frame: {0}")]
    Image(#[from] image::ImageError),
}

/// Rates the most recent preview frame by its brightness and sharpness.
///
/// Light proxy: mean luma scaled to 0-100. Focus proxy: Laplacian
/// variance divided by [`FrameProbe::FOCUS_SCALE`], capped at 100. With no
/// frame yet the probe reports `good`.
#[derive(Default)]
pub struct FrameProbe {
    latest: RwLock<Option<GrayImage>>,
}

impl FrameProbe {
    pub const FOCUS_SCALE: f64 = 5.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and keep an encoded preview frame (JPEG/PNG).
    pub fn submit_frame(&self, bytes: &[u8]) -> Result<(), image::ImageError> {
        let gray = image::load_from_memory(bytes)?.to_luma8();
        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(gray);
        }
        Ok(())
    }

    /// Same as [`FrameProbe::submit_frame`] for a base64 payload from the
    /// webview.
    pub fn submit_base64(&self, encoded: &str) -> Result<(), FrameError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        self.submit_frame(&bytes)?;
        Ok(())
    }

    pub fn proxies(frame: &GrayImage) -> (f64, f64) {
        let light = mean_luma(frame) / 255.0 * 100.0;
        let focus = (laplacian_variance(frame) / Self::FOCUS_SCALE).min(100.0);
        (light, focus)
    }
}

impl QualityProbe for FrameProbe {
    fn sample(&self) -> QualityLabel {
        let Ok(latest) = self.latest.read() else {
            return QualityLabel::Good;
        };
        match latest.as_ref() {
            Some(frame) => {
                let (light, focus) = Self::proxies(frame);
                classify(light, focus)
            }
            None => QualityLabel::Good,
        }
    }
}

fn mean_luma(img: &GrayImage) -> f64 {
    let count = u64::from(img.width()) * u64::from(img.height());
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = img.pixels().map(|p| u64::from(p.0[0])).sum();
    sum as f64 / count as f64
}

/// Variance of the 3x3 Laplacian `[0,1,0; 1,-4,1; 0,1,0]`. Higher is sharper.
fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = (img.width(), img.height());
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| f64::from(img.get_pixel(x, y).0[0]);
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    ((sum_sq / count as f64) - mean * mean).max(0.0)
}

// ═══════════════════════════════════════════════════════════
// Monitor
// ═══════════════════════════════════════════════════════════

/// Periodically re-samples a probe and exposes the latest label.
///
/// Must be started inside a tokio runtime. The sampling task stops when
/// the monitor is dropped.
pub struct QualityMonitor {
    poor: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl QualityMonitor {
    pub fn start(probe: Arc<dyn QualityProbe>, interval: Duration) -> Self {
        let poor = Arc::new(AtomicBool::new(false));
        let flag = poor.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let is_poor = probe.sample() == QualityLabel::Poor;
                if flag.swap(is_poor, Ordering::Relaxed) != is_poor {
                    tracing::debug!(poor = is_poor, "Capture quality changed");
                }
            }
        });

        Self {
            poor,
            task: Some(task),
        }
    }

    /// A monitor that never samples and always reports `label`.
    pub fn fixed(label: QualityLabel) -> Self {
        Self {
            poor: Arc::new(AtomicBool::new(label == QualityLabel::Poor)),
            task: None,
        }
    }

    pub fn current_quality_label(&self) -> QualityLabel {
        if self.poor.load(Ordering::Relaxed) {
            QualityLabel::Poor
        } else {
            QualityLabel::Good
        }
    }
}

impl Drop for QualityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
