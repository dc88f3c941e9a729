//! Device SDK seams.
//!
//! Camera, gallery, content resolution, geolocation, the share sheet and
//! the OS permission prompt all live outside this crate. The front-end (or
//! a test double) implements these traits; everything above them is
//! platform-agnostic.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::models::{Address, PermissionKind};

/// Errors raised by device-side collaborators.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Cannot read asset {uri}: {reason}")]
    AssetRead { uri: String, reason: String },

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Share sheet failed: {0}")]
    Share(String),
}

/// Whatever reference the camera or gallery handed back.
///
/// May be a plain path, a `file://` URI or a platform content handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAsset {
    pub uri: String,
}

impl RawAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Latitude/longitude fix from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// How the user left the share sheet. Dismissal is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOutcome {
    Shared,
    Dismissed,
}

/// One OS permission prompt. Called at most once per kind per session.
#[async_trait]
pub trait PermissionPrompter: Send + Sync {
    async fn prompt(&self, kind: PermissionKind) -> bool;
}

/// Camera and gallery.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn take_picture(&self) -> Result<RawAsset, DeviceError>;

    /// `Ok(None)` when the user dismisses the picker.
    async fn pick_image(&self) -> Result<Option<RawAsset>, DeviceError>;
}

/// Reads bytes behind a platform content handle (`content://`, `ph://`).
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn read(&self, uri: &str) -> Result<Vec<u8>, DeviceError>;
}

/// Position fix and reverse geocoding.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoPosition, DeviceError>;

    /// Zero or more candidates; the first is the best match.
    async fn reverse_geocode(&self, position: GeoPosition) -> Result<Vec<Address>, DeviceError>;
}

/// Platform share sheet.
#[async_trait]
pub trait ShareSheet: Send + Sync {
    async fn share_text(&self, title: &str, message: &str) -> Result<ShareOutcome, DeviceError>;

    async fn share_file(&self, path: &Path, mime_type: &str) -> Result<ShareOutcome, DeviceError>;
}

// ═══════════════════════════════════════════════════════════
// Stock implementations
// ═══════════════════════════════════════════════════════════

/// Desktop hosts have no runtime permission model.
pub struct AlwaysGranted;

#[async_trait]
impl PermissionPrompter for AlwaysGranted {
    async fn prompt(&self, _kind: PermissionKind) -> bool {
        true
    }
}

/// Image chosen by the front-end (webview file input or camera capture)
/// and handed over by reference. `None` means the picker was dismissed.
pub struct HandoffImage {
    uri: Option<String>,
}

impl HandoffImage {
    pub fn new(uri: Option<String>) -> Self {
        Self { uri }
    }
}

#[async_trait]
impl ImageSource for HandoffImage {
    async fn take_picture(&self) -> Result<RawAsset, DeviceError> {
        self.uri
            .clone()
            .map(RawAsset::new)
            .ok_or_else(|| DeviceError::CameraUnavailable("no frame was captured".into()))
    }

    async fn pick_image(&self) -> Result<Option<RawAsset>, DeviceError> {
        Ok(self.uri.clone().map(RawAsset::new))
    }
}

/// Resolves handles that wrap a real path (`content:///abs/path`) by
/// reading the path directly.
pub struct FsContentResolver;

#[async_trait]
impl ContentResolver for FsContentResolver {
    async fn read(&self, uri: &str) -> Result<Vec<u8>, DeviceError> {
        let path = strip_scheme(uri);
        tokio::fs::read(&path)
            .await
            .map_err(|e| DeviceError::AssetRead {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Position reported by the front-end (e.g. `navigator.geolocation`).
/// No reverse geocoder is available on this path.
pub struct ReportedLocation {
    position: GeoPosition,
}

impl ReportedLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: GeoPosition { latitude, longitude },
        }
    }

    /// Like [`ReportedLocation::new`], rejecting positions off the globe.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self, DeviceError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DeviceError::InvalidCoordinates { latitude, longitude });
        }
        Ok(Self::new(latitude, longitude))
    }
}

#[async_trait]
impl LocationProvider for ReportedLocation {
    async fn current_position(&self) -> Result<GeoPosition, DeviceError> {
        Ok(self.position)
    }

    async fn reverse_geocode(&self, _position: GeoPosition) -> Result<Vec<Address>, DeviceError> {
        Ok(Vec::new())
    }
}

/// Drop the URI scheme (`file://`, `content://`, …) and return the path part.
pub fn strip_scheme(uri: &str) -> PathBuf {
    match uri.split_once("://") {
        Some((_, rest)) => PathBuf::from(rest),
        None => PathBuf::from(uri),
    }
}
