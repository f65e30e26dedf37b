use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on accepted uploads, in bytes.
pub const MAX_ARTIFACT_BYTES: usize = 500_000;

/// extension_for
///
/// The accepted image MIME types and their stored file extensions. Anything outside
/// this map is rejected before a byte touches the disk.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpg" => Some("jpg"),
        "image/jpeg" => Some("jpeg"),
        _ => None,
    }
}

/// UploadError
///
/// Staging failures. The type/size variants map to a client-facing 400; the IO
/// variant is a server error.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported image content type")]
    UnsupportedType,
    #[error("upload exceeds the size limit")]
    TooLarge,
    #[error("failed to persist upload: {0}")]
    Io(#[from] std::io::Error),
}

// 1. ArtifactStore Contract
/// ArtifactStore
///
/// The abstract contract for the artifact lifecycle. An artifact's on-disk lifetime
/// is coupled to the outcome of the operation that references it: `stage` acquires
/// the resource, and the owning operation either keeps the returned key (success)
/// or calls `release` on every failure exit path. On the delete path, `release`
/// runs only after the database transaction commits.
///
/// The trait allows swapping the concrete implementation, the real disk store
/// (DiskArtifactStore) in production and the recording mock (MockArtifactStore)
/// during testing, without affecting the calling handlers.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Ensures the backing location exists. Called once at startup; no-op in mocks.
    async fn ensure_ready(&self);

    /// Validates and persists an uploaded image, returning the path-shaped key the
    /// owning record will reference (and under which the file is served statically).
    async fn stage(&self, content_type: &str, data: Bytes) -> Result<String, UploadError>;

    /// Best-effort delete. A failure is logged and swallowed: a leaked file is
    /// recoverable by an out-of-band sweep, and it must never fail a user response
    /// or trigger a retry loop.
    async fn release(&self, key: &str);
}

/// ArtifactState
///
/// The concrete type used to share the artifact store across the application state.
pub type ArtifactState = Arc<dyn ArtifactStore>;

// 2. The Real Implementation (local disk)
/// DiskArtifactStore
///
/// Persists artifacts under the configured upload directory with UUID file names,
/// the same directory the router serves statically at /uploads/images.
pub struct DiskArtifactStore {
    root: PathBuf,
}

impl DiskArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    async fn ensure_ready(&self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            tracing::error!("failed to provision upload directory {:?}: {}", self.root, e);
        }
    }

    async fn stage(&self, content_type: &str, data: Bytes) -> Result<String, UploadError> {
        let extension = extension_for(content_type).ok_or(UploadError::UnsupportedType)?;

        if data.len() > MAX_ARTIFACT_BYTES {
            return Err(UploadError::TooLarge);
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.root.join(&file_name);
        tokio::fs::write(&path, &data).await?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn release(&self, key: &str) {
        // Keys come from our own records, but refuse anything that escapes the
        // upload root so a corrupted key can never delete unrelated files.
        let path = Path::new(key);
        if !path.starts_with(&self.root) || key.contains("..") {
            tracing::warn!("refusing to release artifact outside the upload root: {}", key);
            return;
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("failed to release artifact {}: {}", key, e);
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MockArtifactStore
///
/// Applies the same type/size gate as the disk store but keeps everything in
/// memory, recording every staged and released key. Tests assert the cleanup
/// ordering guarantees against those recordings.
#[derive(Default)]
pub struct MockArtifactStore {
    /// When true, staging returns a simulated IO failure.
    fail_stage: bool,
    staged: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            fail_stage: true,
            ..Self::default()
        }
    }

    /// Every key handed out by `stage`, in order.
    pub fn staged_keys(&self) -> Vec<String> {
        self.staged.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every key passed to `release`, in order.
    pub fn released_keys(&self) -> Vec<String> {
        self.released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn ensure_ready(&self) {
        // No-op in mock environment.
    }

    async fn stage(&self, content_type: &str, data: Bytes) -> Result<String, UploadError> {
        if self.fail_stage {
            return Err(UploadError::Io(std::io::Error::other(
                "simulated staging failure",
            )));
        }

        let extension = extension_for(content_type).ok_or(UploadError::UnsupportedType)?;
        if data.len() > MAX_ARTIFACT_BYTES {
            return Err(UploadError::TooLarge);
        }

        let key = format!("uploads/images/{}.{}", Uuid::new_v4(), extension);
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());
        Ok(key)
    }

    async fn release(&self, key: &str) {
        self.released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.to_string());
    }
}
