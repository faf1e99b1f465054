use anyhow::Result;

use crate::classify::RawDetection;
use crate::frame::Frame;

/// Object detector producing labelled boxes in frame pixel coordinates.
///
/// Detectors take `&self` so lanes can be processed from several worker
/// threads at once. An `Err` degrades only the lane whose frame failed.
pub trait Detector: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>>;
}
