//! Capture devices backed by files already on disk.
//!
//! A terminal has no microphone or camera; `voice` and `photo` hand the CLI a
//! finished recording or picture, which goes through the same capture
//! session as live hardware would.

use std::path::{Path, PathBuf};

use messy_core::{CaptureDevice, Error, Result};

pub struct FileSource {
    label: &'static str,
    path: PathBuf,
    acquired: bool,
}

impl FileSource {
    pub fn microphone(path: impl AsRef<Path>) -> Self {
        Self::new("microphone", path)
    }

    pub fn camera(path: impl AsRef<Path>) -> Self {
        Self::new("camera", path)
    }

    fn new(label: &'static str, path: impl AsRef<Path>) -> Self {
        Self {
            label,
            path: path.as_ref().to_path_buf(),
            acquired: false,
        }
    }

    #[cfg(test)]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl CaptureDevice for FileSource {
    fn name(&self) -> &str {
        self.label
    }

    fn acquire(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(Error::Media(format!(
                "{}: no capture at {}",
                self.label,
                self.path.display()
            )));
        }
        self.acquired = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<PathBuf> {
        Ok(self.path.clone())
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}
