//! Per-lane detection aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::{Detection, LabelNormalizer, RawDetection, VehicleClass};
use crate::geometry::{self, Region};

/// Vehicle counts by class. Only classes with at least one vehicle are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneCounts(BTreeMap<VehicleClass, u32>);

impl LaneCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, class: VehicleClass) {
        *self.0.entry(class).or_insert(0) += 1;
    }

    pub fn get(&self, class: VehicleClass) -> u32 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, u32)> + '_ {
        self.0.iter().map(|(class, count)| (*class, *count))
    }
}

impl FromIterator<(VehicleClass, u32)> for LaneCounts {
    fn from_iter<I: IntoIterator<Item = (VehicleClass, u32)>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for (class, count) in iter {
            if count > 0 {
                *counts.entry(class).or_insert(0) += count;
            }
        }
        Self(counts)
    }
}

/// Accepted detections of one lane and their per-class counts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneTally {
    pub counts: LaneCounts,
    pub accepted: Vec<Detection>,
}

/// Filter `detections` to vehicles whose center lies in `region` and count them.
///
/// Input order is preserved in `accepted`.
pub fn aggregate(
    normalizer: &LabelNormalizer,
    detections: &[RawDetection],
    region: Option<&Region>,
) -> LaneTally {
    let mut tally = LaneTally::default();
    for raw in detections {
        let Some(det) = normalizer.normalize(raw) else {
            log::debug!("rejected '{}': not a vehicle class", raw.label);
            continue;
        };
        if !geometry::contains(det.center(), region) {
            log::debug!(
                "rejected {} at ({:.1}, {:.1}): outside lane region",
                det.class,
                det.cx,
                det.cy
            );
            continue;
        }
        tally.counts.increment(det.class);
        tally.accepted.push(det);
    }
    tally
}
