//! Pipeline output records.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::{LaneCounts, LaneTally};
use crate::classify::Detection;

/// How a lane's frame was processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneStatus {
    Processed,
    /// Frame could not be resolved or decoded.
    FrameUnavailable,
    /// Detector returned an error for this lane's frame.
    DetectorFailed,
}

/// Outcome for one lane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneResult {
    #[serde(rename = "laneId")]
    pub lane_id: String,
    pub image: Option<String>,
    pub image_resolved: Option<String>,
    pub status: LaneStatus,
    pub counts: LaneCounts,
    pub total: u32,
    pub green_time: u32,
    pub detections: Vec<Detection>,
}

impl LaneResult {
    /// Result for a processed lane. `total` is derived from the counts.
    pub fn processed(lane_id: &str, tally: LaneTally, green_time: u32) -> Self {
        Self {
            lane_id: lane_id.to_string(),
            image: None,
            image_resolved: None,
            status: LaneStatus::Processed,
            total: tally.counts.total(),
            counts: tally.counts,
            green_time,
            detections: tally.accepted,
        }
    }

    /// Zero-detection result for a lane whose frame or detector failed.
    pub fn degraded(lane_id: &str, status: LaneStatus, min_green: u32) -> Self {
        Self {
            lane_id: lane_id.to_string(),
            image: None,
            image_resolved: None,
            status,
            counts: LaneCounts::new(),
            total: 0,
            green_time: min_green,
            detections: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: Option<&str>, resolved: Option<&Path>) -> Self {
        self.image = image.map(str::to_string);
        self.image_resolved = resolved.map(|p| p.display().to_string());
        self
    }
}

/// Totals across one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub lanes: usize,
    pub vehicles: u64,
    pub per_lane: Vec<(String, u32)>,
    /// Lane with the highest total; the earliest lane wins ties.
    pub busiest_lane: Option<String>,
    pub degraded_lanes: usize,
}

/// All lane results of one invocation, in lane-file order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub lanes: Vec<LaneResult>,
}

impl PipelineResult {
    pub fn new(lanes: Vec<LaneResult>) -> Result<Self> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64();
        Ok(Self { timestamp, lanes })
    }

    pub fn lane(&self, lane_id: &str) -> Option<&LaneResult> {
        self.lanes.iter().find(|lane| lane.lane_id == lane_id)
    }

    pub fn summary(&self) -> RunSummary {
        let mut busiest: Option<&LaneResult> = None;
        for lane in &self.lanes {
            if lane.total > 0 && busiest.map_or(true, |b| lane.total > b.total) {
                busiest = Some(lane);
            }
        }
        RunSummary {
            lanes: self.lanes.len(),
            vehicles: self.lanes.iter().map(|l| l.total as u64).sum(),
            per_lane: self
                .lanes
                .iter()
                .map(|l| (l.lane_id.clone(), l.total))
                .collect(),
            busiest_lane: busiest.map(|l| l.lane_id.clone()),
            degraded_lanes: self
                .lanes
                .iter()
                .filter(|l| l.status != LaneStatus::Processed)
                .count(),
        }
    }

    /// Write pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classify::{LabelNormalizer, RawDetection, VehicleClass};

    fn processed(id: &str, labels: &[&str]) -> LaneResult {
        let dets: Vec<_> = labels
            .iter()
            .map(|l| RawDetection::new(*l, [0.0, 0.0, 2.0, 2.0]))
            .collect();
        let tally = aggregate(&LabelNormalizer::new(), &dets, None);
        LaneResult::processed(id, tally, 12)
    }

    #[test]
    fn serializes_lane_fields() {
        let lane = processed("1", &["car", "truck", "car"])
            .with_image(Some("images/1.jpg"), Some(Path::new("/data/images/1.jpg")));
        let v = serde_json::to_value(&lane).unwrap();
        assert_eq!(v["laneId"], "1");
        assert_eq!(v["status"], "processed");
        assert_eq!(v["counts"]["car"], 2);
        assert_eq!(v["total"], 3);
        assert_eq!(v["green_time"], 12);
        assert_eq!(v["image_resolved"], "/data/images/1.jpg");
        assert_eq!(v["detections"][0]["class"], "car");
        assert_eq!(v["detections"][0]["bbox"], serde_json::json!([0.0, 0.0, 2.0, 2.0]));
        assert_eq!(v["detections"][0]["cx"], 1.0);
    }

    #[test]
    fn degraded_lane_is_empty_min_green() {
        let lane = LaneResult::degraded("x", LaneStatus::FrameUnavailable, 10);
        assert_eq!(lane.total, 0);
        assert!(lane.counts.is_empty());
        assert!(lane.detections.is_empty());
        assert_eq!(lane.green_time, 10);
        assert_eq!(
            serde_json::to_value(&lane).unwrap()["status"],
            "frame_unavailable"
        );
    }

    #[test]
    fn summary_totals() {
        let result = PipelineResult::new(vec![
            processed("a", &["car"]),
            processed("b", &["car", "bus", "dog"]),
            processed("c", &["bicycle", "car"]),
            LaneResult::degraded("d", LaneStatus::DetectorFailed, 10),
        ])
        .unwrap();
        let s = result.summary();
        assert_eq!(s.lanes, 4);
        assert_eq!(s.vehicles, 5);
        assert_eq!(s.busiest_lane.as_deref(), Some("b"));
        assert_eq!(s.degraded_lanes, 1);
        assert_eq!(s.per_lane[3], ("d".to_string(), 0));
        assert_eq!(result.lane("b").unwrap().counts.get(VehicleClass::Bus), 1);
    }

    #[test]
    fn write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/result.json");
        let result = PipelineResult::new(vec![processed("a", &["car"])]).unwrap();
        result.write_json(&path).unwrap();
        let back: PipelineResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.lanes, result.lanes);
    }
}
