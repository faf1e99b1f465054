//! Lane occupancy counting and adaptive green time.
//!
//! The crate turns per-lane object detections from traffic cameras into a
//! signal-timing decision.
//!
//! # Pipeline
//!
//! 1. `frame`: resolve each lane's frame specifier to a decoded frame
//! 2. `detect`: run a detector collaborator on the frame
//! 3. `classify`: normalize labels and keep only vehicle classes
//! 4. `geometry`: keep detections whose box center lies in the lane region
//! 5. `aggregate`: count accepted vehicles by class
//! 6. `timing`: compute a bounded green duration from the counts
//! 7. `pipeline`: run every lane and collect a `PipelineResult`
//!
//! Per-lane failures (missing frame, detector error) never abort a run; the
//! lane is reported with zero vehicles and the minimum green time. Only a
//! bad configuration or lane file stops a run before it starts.

pub mod aggregate;
pub mod alert;
pub mod classify;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod lane;
pub mod pipeline;
pub mod result;
pub mod timing;

pub use aggregate::{aggregate, LaneCounts, LaneTally};
pub use alert::{dispatch, Alert, AlertPolicy, AlertSink, LogAlertSink};
#[cfg(feature = "alert-http")]
pub use alert::HttpAlertSink;
pub use classify::{Detection, LabelNormalizer, RawDetection, VehicleClass};
pub use config::SignalConfig;
pub use detect::{Detector, DetectorRegistry, SidecarBackend, StubBackend};
pub use frame::{FileFrameResolver, Frame, FrameResolver};
pub use geometry::{assign_region, contains, BoundingBox, Point, Region};
pub use lane::{validate_lane_id, LaneConfig, LaneSet};
pub use pipeline::Pipeline;
pub use result::{LaneResult, LaneStatus, PipelineResult, RunSummary};
pub use timing::{compute_green, GreenTimePolicy, MAX_GREEN_S, MIN_GREEN_S, SAFETY_BUFFER_S};

/// Registry with every built-in detector; `sidecar` is the default.
pub fn default_detectors() -> DetectorRegistry {
    let mut registry = DetectorRegistry::new();
    registry.register(SidecarBackend::new());
    registry.register(StubBackend::empty());
    registry
}
