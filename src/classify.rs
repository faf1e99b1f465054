//! Detection label normalization.
//!
//! Detector labels arrive as free-form strings. Only the five vehicle classes
//! are counted; every other label is dropped here, before geometry runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Vehicle classes that contribute to lane occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Bicycle,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Motorcycle,
        VehicleClass::Bicycle,
    ];

    /// Seconds needed to clear one vehicle of this class through the junction.
    pub fn service_time(self) -> f64 {
        match self {
            VehicleClass::Car => 2.0,
            VehicleClass::Truck => 2.5,
            VehicleClass::Bus => 2.5,
            VehicleClass::Motorcycle => 1.2,
            VehicleClass::Bicycle => 1.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bicycle => "bicycle",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        VehicleClass::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow!("'{}' is not a vehicle class", s))
    }
}

/// One detector output before normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "class", alias = "label")]
    pub label: String,
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, bbox: [f64; 4]) -> Self {
        Self {
            label: label.into(),
            bbox: bbox.into(),
            confidence: None,
        }
    }
}

/// A detection that passed class normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: VehicleClass,
    pub bbox: BoundingBox,
    pub cx: f64,
    pub cy: f64,
}

impl Detection {
    pub fn center(&self) -> Point {
        Point::new(self.cx, self.cy)
    }
}

/// Lower-cases labels, applies alias corrections and maps to `VehicleClass`.
#[derive(Clone, Debug)]
pub struct LabelNormalizer {
    aliases: BTreeMap<String, VehicleClass>,
}

impl Default for LabelNormalizer {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        // YOLO exports seen in the field emit "buss".
        aliases.insert("buss".to_string(), VehicleClass::Bus);
        Self { aliases }
    }
}

impl LabelNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an alias. The alias is matched after lower-casing.
    pub fn with_alias(mut self, alias: &str, class: VehicleClass) -> Self {
        self.add_alias(alias, class);
        self
    }

    pub fn add_alias(&mut self, alias: &str, class: VehicleClass) {
        self.aliases.insert(alias.trim().to_lowercase(), class);
    }

    /// Normalize a label to a vehicle class, or `None` for any other object.
    pub fn class_of(&self, label: &str) -> Option<VehicleClass> {
        let label = label.trim().to_lowercase();
        if let Some(class) = self.aliases.get(&label) {
            return Some(*class);
        }
        label.parse().ok()
    }

    /// Normalize one raw detection. Rejection is `None`, not an error.
    pub fn normalize(&self, raw: &RawDetection) -> Option<Detection> {
        let class = self.class_of(&raw.label)?;
        let center = raw.bbox.center();
        Some(Detection {
            class,
            bbox: raw.bbox,
            cx: center.x,
            cy: center.y,
        })
    }
}
