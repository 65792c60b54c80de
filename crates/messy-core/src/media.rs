//! Captured media: scoped device sessions and the on-disk media library.
//!
//! Recorders and cameras write to scratch files. Before a note references a
//! capture, [`MediaLibrary`] copies it into a stable location:
//!
//! ```text
//! {root}/audio/voice-note-{unix_ms}.m4a
//! {root}/images/photo-{unix_ms}.{ext}
//! ```
//!
//! [`CaptureSession`] guards the hardware side. The device is acquired when
//! the session opens and released exactly once when it ends, whether by
//! `finish`, `cancel`, or being dropped (navigation away, error unwinding).

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::defaults::{AUDIO_EXTENSION, AUDIO_SUBDIR, IMAGE_SUBDIR, MEDIA_DIR};
use crate::error::{Error, Result};

/// Environment variable overriding the media root.
pub const MEDIA_DIR_ENV: &str = "MESSY_NOTES_MEDIA_DIR";

// =============================================================================
// CAPTURE SESSIONS
// =============================================================================

/// A microphone or camera.
pub trait CaptureDevice {
    /// Human-readable device name for logs.
    fn name(&self) -> &str;

    /// Claim the hardware and start capturing.
    fn acquire(&mut self) -> Result<()>;

    /// Stop capturing and return the scratch file holding the capture.
    fn stop(&mut self) -> Result<PathBuf>;

    /// Give the hardware back. Must tolerate being called after `stop`.
    fn release(&mut self);
}

/// Scoped acquisition of a [`CaptureDevice`].
pub struct CaptureSession<'a, D: CaptureDevice> {
    device: &'a mut D,
    active: bool,
}

impl<'a, D: CaptureDevice> CaptureSession<'a, D> {
    /// Acquire `device`. On failure nothing is held.
    pub fn open(device: &'a mut D) -> Result<Self> {
        device.acquire().map_err(|e| match e {
            Error::Media(msg) => Error::Media(msg),
            other => Error::Media(format!("{}: {}", device.name(), other)),
        })?;
        debug!(device = device.name(), "Capture session opened");
        Ok(Self {
            device,
            active: true,
        })
    }

    pub fn device(&self) -> &D {
        &*self.device
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop the capture and release the device; returns the scratch file.
    pub fn finish(mut self) -> Result<PathBuf> {
        let result = self.device.stop();
        self.release();
        result
    }

    /// Abandon the capture and release the device.
    pub fn cancel(mut self) {
        debug!(device = self.device.name(), "Capture cancelled");
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            self.device.release();
            debug!(device = self.device.name(), "Capture device released");
        }
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<'_, D> {
    fn drop(&mut self) {
        if self.active {
            warn!(
                device = self.device.name(),
                "Capture session dropped while active, releasing device"
            );
            self.release();
        }
    }
}

// =============================================================================
// MEDIA LIBRARY
// =============================================================================

/// Directory holding captured recordings and photos.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `MESSY_NOTES_MEDIA_DIR`, else `./media`.
    pub fn from_env() -> Self {
        Self::new(std::env::var(MEDIA_DIR_ENV).unwrap_or_else(|_| MEDIA_DIR.to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy a finished recording into `audio/`.
    pub async fn save_recording(&self, source: &Path) -> Result<PathBuf> {
        self.save(source, AUDIO_SUBDIR, "voice-note", AUDIO_EXTENSION)
            .await
    }

    /// Copy a photo into `images/`, keeping its extension (default `jpg`).
    pub async fn save_photo(&self, source: &Path) -> Result<PathBuf> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "jpg".to_string());
        self.save(source, IMAGE_SUBDIR, "photo", &ext).await
    }

    /// Delete a stored capture. Missing files are not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        if !path.starts_with(&self.root) {
            return Err(Error::Media(format!(
                "{} is outside the media library",
                path.display()
            )));
        }
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// URI stored on the note for a library path.
    pub fn uri_for(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    async fn save(&self, source: &Path, subdir: &str, prefix: &str, ext: &str) -> Result<PathBuf> {
        let meta = fs::metadata(source).await.map_err(|e| {
            Error::Media(format!("capture file {} unavailable: {}", source.display(), e))
        })?;
        if !meta.is_file() {
            return Err(Error::Media(format!("{} is not a file", source.display())));
        }

        let dir = self.root.join(subdir);
        fs::create_dir_all(&dir).await?;

        let target = unique_path(&dir, prefix, ext).await?;
        fs::copy(source, &target).await?;

        info!(
            subsystem = "media",
            from = %source.display(),
            to = %target.display(),
            bytes = meta.len(),
            "Capture saved"
        );
        Ok(target)
    }
}

/// `{dir}/{prefix}-{unix_ms}.{ext}`, suffixed `-1`, `-2`, ... on collision.
async fn unique_path(dir: &Path, prefix: &str, ext: &str) -> Result<PathBuf> {
    let stamp = Utc::now().timestamp_millis();
    let mut candidate = dir.join(format!("{}-{}.{}", prefix, stamp, ext));
    let mut n = 1;
    while fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{}-{}-{}.{}", prefix, stamp, n, ext));
        n += 1;
    }
    Ok(candidate)
}
