//! Green-time computation from lane vehicle counts.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::LaneCounts;

pub const MIN_GREEN_S: u32 = 10;
pub const MAX_GREEN_S: u32 = 60;
pub const SAFETY_BUFFER_S: u32 = 3;

/// Bounds and buffer of the green-time heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreenTimePolicy {
    pub min_green: u32,
    pub max_green: u32,
    pub safety_buffer: u32,
}

impl Default for GreenTimePolicy {
    fn default() -> Self {
        Self {
            min_green: MIN_GREEN_S,
            max_green: MAX_GREEN_S,
            safety_buffer: SAFETY_BUFFER_S,
        }
    }
}

impl GreenTimePolicy {
    pub fn new(min_green: u32, max_green: u32, safety_buffer: u32) -> Result<Self> {
        let policy = Self {
            min_green,
            max_green,
            safety_buffer,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_green == 0 {
            return Err(anyhow!("min_green must be at least 1 second"));
        }
        if self.min_green > self.max_green {
            return Err(anyhow!(
                "min_green ({}) must not exceed max_green ({})",
                self.min_green,
                self.max_green
            ));
        }
        Ok(())
    }

    /// Green duration in whole seconds, always in `[min_green, max_green]`.
    ///
    /// `ceil(total * avg_service + safety_buffer)`, where `avg_service` is
    /// the count-weighted mean service time of the lane's vehicles.
    pub fn compute_green(&self, counts: &LaneCounts) -> u32 {
        let total = counts.total();
        if total == 0 {
            return self.min_green;
        }
        let total_service: f64 = counts
            .iter()
            .map(|(class, count)| count as f64 * class.service_time())
            .sum();
        let avg_service = total_service / total as f64;
        let green = (total as f64 * avg_service + self.safety_buffer as f64).ceil();
        // Float-to-int casts saturate, so huge counts land on max_green.
        // min_green wins if the bounds were set inconsistently.
        (green as u32).min(self.max_green).max(self.min_green)
    }
}

/// `GreenTimePolicy::default().compute_green(counts)`.
pub fn compute_green(counts: &LaneCounts) -> u32 {
    GreenTimePolicy::default().compute_green(counts)
}
