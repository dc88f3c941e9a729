//! Image acquisition: permission, capture or pick, path normalization.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::device::{strip_scheme, ContentResolver, DeviceError, ImageSource};
use crate::models::{CaptureOrigin, CaptureRequest, PermissionKind};
use crate::permissions::PermissionGate;

use super::CaptureError;

/// URI schemes that name a platform content handle rather than a file.
const CONTENT_SCHEMES: [&str; 3] = ["content", "ph", "assets-library"];

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "heic", "bmp"];

const STAGED_PREFIX: &str = "capture-";

/// Acquires one image per attempt.
///
/// A content-handle copy lives until the next successful acquisition
/// replaces it; the displayed result may still point at the latest one.
pub struct Acquisition {
    gate: Arc<PermissionGate>,
    resolver: Arc<dyn ContentResolver>,
    staging_dir: PathBuf,
    last_staged: Mutex<Option<PathBuf>>,
}

impl Acquisition {
    pub fn new(
        gate: Arc<PermissionGate>,
        resolver: Arc<dyn ContentResolver>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            gate,
            resolver,
            staging_dir: staging_dir.into(),
            last_staged: Mutex::new(None),
        }
    }

    /// Remove every staged copy left in the staging directory, e.g. by a
    /// previous run. Returns how many files were deleted.
    pub fn clear_staging(&self) -> std::io::Result<usize> {
        let entries = match std::fs::read_dir(&self.staging_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_staged = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGED_PREFIX));
            if is_staged && entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if let Ok(mut last) = self.last_staged.lock() {
            *last = None;
        }
        Ok(removed)
    }

    pub async fn capture_from_camera(
        &self,
        source: &dyn ImageSource,
    ) -> Result<CaptureRequest, CaptureError> {
        if !self.gate.request(PermissionKind::Camera).await {
            return Err(CaptureError::PermissionDenied(PermissionKind::Camera));
        }
        let asset = source.take_picture().await?;
        self.into_request(&asset.uri, CaptureOrigin::Camera).await
    }

    /// `Err(Cancelled)` when the user dismisses the picker.
    pub async fn pick_from_gallery(
        &self,
        source: &dyn ImageSource,
    ) -> Result<CaptureRequest, CaptureError> {
        if !self.gate.request(PermissionKind::Gallery).await {
            return Err(CaptureError::PermissionDenied(PermissionKind::Gallery));
        }
        match source.pick_image().await? {
            Some(asset) => self.into_request(&asset.uri, CaptureOrigin::Gallery).await,
            None => Err(CaptureError::Cancelled),
        }
    }

    async fn into_request(
        &self,
        uri: &str,
        origin: CaptureOrigin,
    ) -> Result<CaptureRequest, CaptureError> {
        let source_uri = normalize_capture(uri, self.resolver.as_ref(), &self.staging_dir).await?;
        let staged = Path::new(&source_uri);
        let current = staged
            .starts_with(&self.staging_dir)
            .then(|| staged.to_path_buf());
        self.replace_staged(current).await;
        tracing::debug!(%origin, path = %source_uri, "Capture acquired");
        Ok(CaptureRequest { source_uri, origin })
    }

    /// Remember `current` and delete the copy staged before it, if any.
    async fn replace_staged(&self, current: Option<PathBuf>) {
        let previous = match self.last_staged.lock() {
            Ok(mut last) => std::mem::replace(&mut *last, current),
            Err(_) => None,
        };
        if let Some(path) = previous {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove staged capture");
                }
            }
        }
    }
}

/// Turn whatever the device returned into a readable local path.
///
/// Content handles are copied into `staging_dir` as
/// `capture-<uuid>.<ext>`; `file://` URIs lose their scheme; plain paths
/// pass through.
pub async fn normalize_capture(
    uri: &str,
    resolver: &dyn ContentResolver,
    staging_dir: &Path,
) -> Result<String, DeviceError> {
    let scheme = uri.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        Some(s) if CONTENT_SCHEMES.contains(&s) => {
            let bytes = resolver.read(uri).await?;
            let target = staging_dir.join(format!(
                "{STAGED_PREFIX}{}.{}",
                uuid::Uuid::new_v4(),
                image_extension(uri)
            ));
            let staging_error = |e: std::io::Error| DeviceError::AssetRead {
                uri: uri.to_string(),
                reason: e.to_string(),
            };
            tokio::fs::create_dir_all(staging_dir)
                .await
                .map_err(staging_error)?;
            tokio::fs::write(&target, bytes).await.map_err(staging_error)?;
            Ok(target.to_string_lossy().into_owned())
        }
        Some("file") => Ok(strip_scheme(uri).to_string_lossy().into_owned()),
        _ => Ok(uri.to_string()),
    }
}

/// Lowercased image extension of `uri`, `jpg` when absent or unknown.
pub fn image_extension(uri: &str) -> String {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AlwaysGranted, FsContentResolver, HandoffImage, PermissionPrompter};
    use async_trait::async_trait;

    struct Deny;

    #[async_trait]
    impl PermissionPrompter for Deny {
        async fn prompt(&self, _kind: PermissionKind) -> bool {
            false
        }
    }

    fn acquisition(prompter: Arc<dyn PermissionPrompter>, dir: &Path) -> Acquisition {
        Acquisition::new(
            Arc::new(PermissionGate::new(prompter)),
            Arc::new(FsContentResolver),
            dir.join("captures"),
        )
    }

    #[test]
    fn extension_detection() {
        assert_eq!(image_extension("/a/b/leaf.PNG"), "png");
        assert_eq!(image_extension("content://media/external/images/1234"), "jpg");
        assert_eq!(image_extension("/a.b/leaf"), "jpg");
    }

    #[tokio::test]
    async fn file_uri_becomes_plain_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = normalize_capture("file:///tmp/leaf.jpg", &FsContentResolver, dir.path())
            .await
            .unwrap();
        assert_eq!(path, "/tmp/leaf.jpg");
    }

    #[tokio::test]
    async fn content_handle_is_copied_into_staging() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("picked.png");
        std::fs::write(&original, b"png-bytes").unwrap();

        let staging = dir.path().join("captures");
        let uri = format!("content://{}", original.display());
        let path = normalize_capture(&uri, &FsContentResolver, &staging)
            .await
            .unwrap();

        assert!(path.starts_with(staging.to_str().unwrap()));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn dismissed_picker_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());
        let err = acq
            .pick_from_gallery(&HandoffImage::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
    }

    #[tokio::test]
    async fn denied_camera_never_touches_source() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(Arc::new(Deny), dir.path());
        let err = acq
            .capture_from_camera(&HandoffImage::new(Some("/tmp/leaf.jpg".into())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::PermissionDenied(PermissionKind::Camera)
        ));
    }

    #[tokio::test]
    async fn camera_capture_records_origin() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());
        let request = acq
            .capture_from_camera(&HandoffImage::new(Some("file:///tmp/leaf.jpg".into())))
            .await
            .unwrap();
        assert_eq!(request.origin, CaptureOrigin::Camera);
        assert_eq!(request.source_uri, "/tmp/leaf.jpg");
    }

    fn staged_files(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn only_latest_staged_copy_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("picked.jpg");
        std::fs::write(&original, b"jpeg-bytes").unwrap();
        let uri = format!("content://{}", original.display());
        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());

        let mut latest = String::new();
        for _ in 0..5 {
            latest = acq
                .pick_from_gallery(&HandoffImage::new(Some(uri.clone())))
                .await
                .unwrap()
                .source_uri;
        }

        let staged = staged_files(&dir.path().join("captures"));
        assert_eq!(staged, vec![PathBuf::from(&latest)]);
        assert!(original.exists());
    }

    #[tokio::test]
    async fn cancelled_attempt_keeps_displayed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("picked.png");
        std::fs::write(&original, b"png-bytes").unwrap();
        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());

        acq.pick_from_gallery(&HandoffImage::new(Some(format!(
            "content://{}",
            original.display()
        ))))
        .await
        .unwrap();
        assert_eq!(staged_files(&dir.path().join("captures")).len(), 1);

        let err = acq
            .pick_from_gallery(&HandoffImage::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(staged_files(&dir.path().join("captures")).len(), 1);

        let photo = dir.path().join("leaf.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        acq.pick_from_gallery(&HandoffImage::new(Some(photo.display().to_string())))
            .await
            .unwrap();
        assert!(staged_files(&dir.path().join("captures")).is_empty());
    }

    #[tokio::test]
    async fn plain_paths_are_never_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("leaf.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());

        for _ in 0..2 {
            acq.capture_from_camera(&HandoffImage::new(Some(format!("file://{}", photo.display()))))
                .await
                .unwrap();
        }
        assert!(photo.exists());
    }

    #[test]
    fn clear_staging_removes_leftovers_only() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("captures");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("capture-old.jpg"), b"x").unwrap();
        std::fs::write(staging.join("capture-older.png"), b"x").unwrap();
        std::fs::write(staging.join("notes.txt"), b"keep").unwrap();

        let acq = acquisition(Arc::new(AlwaysGranted), dir.path());
        assert_eq!(acq.clear_staging().unwrap(), 2);
        assert_eq!(staged_files(&staging), vec![staging.join("notes.txt")]);

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(acquisition(Arc::new(AlwaysGranted), empty.path()).clear_staging().unwrap(), 0);
    }
}
