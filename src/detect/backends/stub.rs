use anyhow::Result;

use crate::classify::RawDetection;
use crate::detect::backend::Detector;
use crate::frame::Frame;

/// Stub backend for testing. Returns the same detections for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    detections: Vec<RawDetection>,
}

impl StubBackend {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl Detector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}
