//! Frames from a directory written by another process
//!
//! The acquisition software saves each exposure as an image file. Each poll
//! lists the directory, and if any file appeared (or was rewritten) since the
//! previous poll, the most recently modified one is loaded. Older new files
//! from the same poll are skipped so the guider always works on the latest
//! exposure.
//!
//! A single writer is assumed. A file that is still being written can be
//! picked up; it then fails to decode and the cycle is skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use image::DynamicImage;
use ndarray::Array2;

use super::{CameraError, CameraResult, FrameSource};

/// Image extensions picked up by default.
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["tif", "tiff", "png"];

/// Watches a directory and serves the newest unseen image as the next frame.
pub struct DirectoryFrameSource {
    dir: PathBuf,
    extensions: Vec<String>,
    poll_interval: Duration,
    timeout: Duration,
    seen: HashSet<(PathBuf, SystemTime)>,
    connected: bool,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(60),
            seen: HashSet::new(),
            connected: false,
        }
    }

    /// Only pick up files with these extensions (case-insensitive). Empty accepts all files.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// How long [`FrameSource::next_frame`] waits for a new file before a transient timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn list(&self) -> CameraResult<HashSet<(PathBuf, SystemTime)>> {
        let mut found = HashSet::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = entry.metadata()?;
            if !metadata.is_file() || !self.accepts(&path) {
                continue;
            }
            found.insert((path, metadata.modified()?));
        }
        Ok(found)
    }

    /// Newest file that was not present (with the same modification time) at
    /// the previous call. Every file currently listed is marked as seen.
    ///
    /// Ties on modification time resolve to the greatest path.
    pub fn newest_unseen(&mut self) -> CameraResult<Option<PathBuf>> {
        let retrieved = self.list()?;
        let newest = retrieved
            .difference(&self.seen)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(path, _)| path.clone());
        self.seen = retrieved;
        Ok(newest)
    }
}

impl FrameSource for DirectoryFrameSource {
    fn connect(&mut self) -> CameraResult<()> {
        if !self.dir.is_dir() {
            return Err(CameraError::ConnectionFailed(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        log::info!("Watching {} for new frames", self.dir.display());
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> CameraResult<Array2<u16>> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }

        let start = Instant::now();
        loop {
            if let Some(path) = self.newest_unseen()? {
                log::debug!("New frame file {}", path.display());
                return load_frame(&path);
            }
            if start.elapsed() >= self.timeout {
                return Err(CameraError::Timeout(self.timeout));
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn disconnect(&mut self) -> CameraResult<()> {
        self.connected = false;
        Ok(())
    }

    fn name(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// Load a grayscale image file as a frame.
///
/// 8- and 16-bit luma images keep their raw counts; color images are
/// converted to 16-bit luma.
pub fn load_frame(path: &Path) -> CameraResult<Array2<u16>> {
    let decode_err = |reason: String| CameraError::Decode {
        path: path.display().to_string(),
        reason,
    };

    let img = image::open(path).map_err(|e| decode_err(e.to_string()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let pixels: Vec<u16> = match img {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u16::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        other => other.to_luma16().into_raw(),
    };

    Array2::from_shape_vec((height, width), pixels).map_err(|e| decode_err(e.to_string()))
}
