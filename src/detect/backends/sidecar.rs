use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::classify::RawDetection;
use crate::detect::backend::Detector;
use crate::frame::Frame;

const SIDECAR_SUFFIX: &str = ".detections.json";

/// Reads detections written next to each frame by an external model.
///
/// For `images/lane1.jpg` the backend looks for
/// `images/lane1.jpg.detections.json`, then `images/lane1.json`.
/// Boxes are clamped into the frame.
#[derive(Clone, Debug, Default)]
pub struct SidecarBackend;

impl SidecarBackend {
    pub fn new() -> Self {
        Self
    }

    /// Candidate sidecar files for a frame, in lookup order.
    pub fn sidecar_paths(frame_path: &Path) -> Vec<PathBuf> {
        let mut suffixed = frame_path.as_os_str().to_owned();
        suffixed.push(SIDECAR_SUFFIX);
        let mut out = vec![PathBuf::from(suffixed)];
        if frame_path.extension().is_some_and(|ext| ext != "json") {
            out.push(frame_path.with_extension("json"));
        }
        out
    }
}

impl Detector for SidecarBackend {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let source = frame
            .source
            .as_deref()
            .ok_or_else(|| anyhow!("sidecar detector needs a frame loaded from disk"))?;
        let candidates = Self::sidecar_paths(source);
        let path = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| anyhow!("no detections file for {}", source.display()))?;

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections {}", path.display()))?;
        let mut detections: Vec<RawDetection> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detections file {}", path.display()))?;

        if frame.width > 0 && frame.height > 0 {
            for det in &mut detections {
                det.bbox = det.bbox.clamp_to(frame.width, frame.height);
            }
        }
        log::debug!(
            "{}: {} detections from {}",
            self.name(),
            detections.len(),
            path.display()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classify::LabelNormalizer;
    use crate::geometry::{BoundingBox, Point, Region};

    #[test]
    fn sidecar_lookup_order() {
        assert_eq!(
            SidecarBackend::sidecar_paths(Path::new("images/lane1.jpg")),
            vec![
                PathBuf::from("images/lane1.jpg.detections.json"),
                PathBuf::from("images/lane1.json"),
            ]
        );
    }

    #[test]
    fn reads_and_clamps_detections() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("lane.png");
        std::fs::write(
            img.with_extension("json"),
            r#"[{"class": "car", "bbox": [-10, 5, 30, 500]}, {"label": "dog", "bbox": [1, 1, 2, 2]}]"#,
        )
        .unwrap();

        let frame = Frame::blank(100, 50).with_source(&img);
        let dets = SidecarBackend::new().detect(&frame).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].bbox, BoundingBox::new(0.0, 5.0, 30.0, 50.0));
        assert_eq!(dets[1].label, "dog");
    }

    #[test]
    fn edge_touching_box_keeps_its_center() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("lane.png");
        std::fs::write(
            img.with_extension("json"),
            r#"[{"class": "car", "bbox": [100, 100, 200, 200]}]"#,
        )
        .unwrap();

        let frame = Frame::blank(200, 200).with_source(&img);
        let dets = SidecarBackend::new().detect(&frame).unwrap();
        assert_eq!(dets[0].bbox, BoundingBox::new(100.0, 100.0, 200.0, 200.0));

        let region = Region::bbox(150.0, 150.0, 200.0, 200.0).unwrap();
        let tally = aggregate(&LabelNormalizer::new(), &dets, Some(&region));
        assert_eq!(tally.accepted.len(), 1);
        assert_eq!(tally.accepted[0].center(), Point::new(150.0, 150.0));
    }

    #[test]
    fn suffixed_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("lane.png");
        std::fs::write(img.with_extension("json"), "[]").unwrap();
        std::fs::write(
            dir.path().join("lane.png.detections.json"),
            r#"[{"class": "bus", "bbox": [1, 1, 2, 2]}]"#,
        )
        .unwrap();

        let dets = SidecarBackend::new()
            .detect(&Frame::blank(10, 10).with_source(&img))
            .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "bus");
    }

    #[test]
    fn missing_or_invalid_sidecar_fails() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("lane.png");
        let backend = SidecarBackend::new();
        assert!(backend.detect(&Frame::blank(10, 10).with_source(&img)).is_err());
        assert!(backend.detect(&Frame::blank(10, 10)).is_err());

        std::fs::write(img.with_extension("json"), "{not json").unwrap();
        let err = backend
            .detect(&Frame::blank(10, 10).with_source(&img))
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("invalid detections file"));
    }
}
