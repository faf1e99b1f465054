//! Frame resolution.
//!
//! Lanes name their frame with a path specifier. `FileFrameResolver` turns a
//! specifier into an ordered list of candidate files, picks the first that
//! exists and decodes it to RGB. A failed resolution makes the lane degrade
//! to zero detections; it never aborts a run.

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Decoded RGB frame handed to a detector.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// File the frame was decoded from, when it came from disk.
    pub source: Option<PathBuf>,
}

impl Frame {
    /// Build a frame from packed RGB24 pixels.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            source: None,
        })
    }

    /// Blank frame of the given size, for detectors that ignore pixels.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; width as usize * height as usize * 3],
            width,
            height,
            source: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

// ----------------------------------------------------------------------------
// Resolver
// ----------------------------------------------------------------------------

/// Turns a lane's frame specifier into a frame.
pub trait FrameResolver: Send + Sync {
    /// Resolve and load a frame. An error means "unavailable" for this lane.
    fn resolve(&self, spec: &str) -> Result<Frame>;

    /// Where `spec` would be loaded from, for reporting. Defaults to nothing.
    fn locate(&self, _spec: &str) -> Option<PathBuf> {
        None
    }
}

/// Resolves frame specifiers against the working directory and search roots.
#[derive(Clone, Debug)]
pub struct FileFrameResolver {
    cwd: PathBuf,
    roots: Vec<PathBuf>,
}

impl FileFrameResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { cwd, roots }
    }

    /// Override the working directory used for the first candidate.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Ordered candidate paths for `spec`.
    ///
    /// Absolute paths are used as-is. Relative paths are tried against the
    /// working directory, then each root. Specifiers whose first component
    /// starts with `yolo` (a service directory prefix) are also tried with
    /// that component stripped under each root.
    pub fn candidates(&self, spec: &str) -> Vec<PathBuf> {
        let path = Path::new(spec.trim());
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut out = vec![self.cwd.join(path)];
        out.extend(self.roots.iter().map(|root| root.join(path)));

        let mut components = path.components();
        if let Some(Component::Normal(first)) = components.next() {
            let is_service_prefix = first
                .to_str()
                .is_some_and(|s| s.to_lowercase().starts_with("yolo"));
            let rest = components.as_path();
            if is_service_prefix && !rest.as_os_str().is_empty() {
                out.extend(self.roots.iter().map(|root| root.join(rest)));
            }
        }
        out
    }

    fn find(&self, spec: &str) -> Result<PathBuf> {
        let candidates = self.candidates(spec);
        candidates
            .iter()
            .find(|c| c.is_file())
            .cloned()
            .ok_or_else(|| {
                let tried: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
                anyhow!("frame '{}' not found; tried {}", spec, tried.join(", "))
            })
    }
}

impl FrameResolver for FileFrameResolver {
    fn resolve(&self, spec: &str) -> Result<Frame> {
        if spec.trim().is_empty() {
            return Err(anyhow!("lane has no frame path"));
        }
        let path = self.find(spec)?;
        let img = image::open(&path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::from_rgb(img.into_raw(), width, height)?.with_source(path))
    }

    fn locate(&self, spec: &str) -> Option<PathBuf> {
        if spec.trim().is_empty() {
            return None;
        }
        // Report the last candidate when nothing exists, so the output shows
        // where the file was expected.
        self.find(spec)
            .ok()
            .or_else(|| self.candidates(spec).pop())
    }
}
