//! Multi-lane orchestration.
//!
//! Each lane runs resolve → detect → aggregate → green time on its own. A
//! lane whose frame or detector fails degrades to an empty, `min_green`
//! result and the remaining lanes still run. With more than one worker,
//! lanes are mapped over a dedicated rayon pool; results keep lane order.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::aggregate::aggregate;
use crate::classify::LabelNormalizer;
use crate::detect::Detector;
use crate::frame::FrameResolver;
use crate::lane::LaneConfig;
use crate::result::{LaneResult, LaneStatus, PipelineResult};
use crate::timing::GreenTimePolicy;

pub struct Pipeline {
    resolver: Arc<dyn FrameResolver>,
    detector: Arc<dyn Detector>,
    normalizer: LabelNormalizer,
    timing: GreenTimePolicy,
    workers: usize,
    pool: Option<rayon::ThreadPool>,
}

impl Pipeline {
    pub fn new(resolver: Arc<dyn FrameResolver>, detector: Arc<dyn Detector>) -> Self {
        Self {
            resolver,
            detector,
            normalizer: LabelNormalizer::default(),
            timing: GreenTimePolicy::default(),
            workers: 1,
            pool: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: LabelNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Green-time bounds for every lane. Inconsistent bounds are rejected.
    pub fn with_timing(mut self, timing: GreenTimePolicy) -> Result<Self> {
        timing.validate()?;
        self.timing = timing;
        Ok(self)
    }

    /// Number of lanes processed concurrently. Values below 1 are rejected.
    pub fn with_workers(mut self, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(anyhow!("workers must be >= 1"));
        }
        self.pool = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("lane-worker-{}", i))
                .build()
                .map_err(|e| anyhow!("failed to start {} lane workers: {}", workers, e))?;
            Some(pool)
        } else {
            None
        };
        self.workers = workers;
        Ok(self)
    }

    pub fn timing(&self) -> &GreenTimePolicy {
        &self.timing
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process one lane. Never fails: collaborator errors become a degraded
    /// lane result.
    pub fn process_lane(&self, lane: &LaneConfig) -> LaneResult {
        let spec = lane.source.as_deref().unwrap_or("");

        let frame = match self.resolver.resolve(spec) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("lane {}: frame unavailable: {:#}", lane.lane_id, e);
                let located = self.resolver.locate(spec);
                return LaneResult::degraded(
                    &lane.lane_id,
                    LaneStatus::FrameUnavailable,
                    self.timing.min_green,
                )
                .with_image(lane.source.as_deref(), located.as_deref());
            }
        };
        let resolved = frame.source.clone();

        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!(
                    "lane {}: detector {} failed: {:#}",
                    lane.lane_id,
                    self.detector.name(),
                    e
                );
                return LaneResult::degraded(
                    &lane.lane_id,
                    LaneStatus::DetectorFailed,
                    self.timing.min_green,
                )
                .with_image(lane.source.as_deref(), resolved.as_deref());
            }
        };

        let tally = aggregate(&self.normalizer, &detections, lane.region.as_ref());
        let green_time = self.timing.compute_green(&tally.counts);
        log::info!(
            "lane {}: {} of {} detections accepted, green_time={}s",
            lane.lane_id,
            tally.accepted.len(),
            detections.len(),
            green_time
        );
        LaneResult::processed(&lane.lane_id, tally, green_time)
            .with_image(lane.source.as_deref(), resolved.as_deref())
    }

    pub fn run(&self, lanes: &[LaneConfig]) -> Result<PipelineResult> {
        self.run_with_progress(lanes, &|_| {})
    }

    /// Run all lanes; `on_lane` is called as each lane finishes, in
    /// completion order. The returned lanes are always in input order.
    pub fn run_with_progress(
        &self,
        lanes: &[LaneConfig],
        on_lane: &(dyn Fn(&LaneResult) + Sync),
    ) -> Result<PipelineResult> {
        let process = |lane: &LaneConfig| {
            let result = self.process_lane(lane);
            on_lane(&result);
            result
        };
        let results: Vec<LaneResult> = match &self.pool {
            Some(pool) if lanes.len() > 1 => {
                log::debug!("processing {} lanes on {} workers", lanes.len(), self.workers);
                pool.install(|| lanes.par_iter().map(process).collect())
            }
            _ => lanes.iter().map(process).collect(),
        };
        PipelineResult::new(results)
    }
}
