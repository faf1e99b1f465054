//! Lane configuration loading.
//!
//! The lane file is a JSON array of lane descriptors. Each lane names its
//! frame and optionally a region. Regions are validated here, once, so a
//! malformed region stops the run before any lane is processed:
//!
//! - absent region or empty polygon: the lane accepts every detection
//! - polygon with 1 or 2 vertices, inverted box, non-finite coordinate: error

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::geometry::{self, Point, Region};

#[derive(Debug, Deserialize)]
struct LaneFileEntry {
    #[serde(alias = "laneId")]
    lane_id: Option<LaneIdFile>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    polygon: Option<Vec<VertexFile>>,
    #[serde(default)]
    region: Option<RegionFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LaneIdFile {
    Int(i64),
    Str(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VertexFile {
    Object { x: f64, y: f64 },
    Pair([f64; 2]),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RegionFile {
    Polygon { pts: Vec<VertexFile> },
    Bbox { bbox: [f64; 4] },
}

impl VertexFile {
    fn point(&self) -> Point {
        match *self {
            VertexFile::Object { x, y } => Point::new(x, y),
            VertexFile::Pair([x, y]) => Point::new(x, y),
        }
    }
}

fn polygon_region(pts: &[VertexFile]) -> Result<Option<Region>> {
    if pts.is_empty() {
        return Ok(None);
    }
    Region::polygon(pts.iter().map(VertexFile::point).collect()).map(Some)
}

/// One lane: identifier, optional region and frame specifier.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneConfig {
    pub lane_id: String,
    pub region: Option<Region>,
    pub source: Option<String>,
}

impl LaneConfig {
    pub fn new(lane_id: impl Into<String>, region: Option<Region>, source: Option<&str>) -> Self {
        Self {
            lane_id: lane_id.into(),
            region,
            source: source.map(str::to_string),
        }
    }
}

/// Validate a lane identifier: 1..64 of `[A-Za-z0-9_.:-]`.
pub fn validate_lane_id(lane_id: &str) -> Result<()> {
    // Compile once; the pattern is a literal.
    static LANE_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = LANE_ID_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_.:-]{1,64}$").expect("lane id pattern compiles")
    });
    if !re.is_match(lane_id) {
        return Err(anyhow!(
            "lane id '{}' must match ^[A-Za-z0-9_.:-]{{1,64}}$",
            lane_id
        ));
    }
    Ok(())
}

/// Ordered, validated lane list. Order defines output order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneSet {
    lanes: Vec<LaneConfig>,
}

impl LaneSet {
    /// Validate ids (format and uniqueness) and build the set.
    pub fn new(lanes: Vec<LaneConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for lane in &lanes {
            validate_lane_id(&lane.lane_id)?;
            if !seen.insert(lane.lane_id.as_str()) {
                return Err(anyhow!("duplicate lane id '{}'", lane.lane_id));
            }
        }
        Ok(Self { lanes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lane file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid lane file {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: Vec<LaneFileEntry> =
            serde_json::from_str(raw).context("lane file must be a JSON array of lanes")?;
        let lanes = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| lane_from_entry(index, entry))
            .collect::<Result<Vec<_>>>()?;
        Self::new(lanes)
    }

    pub fn lanes(&self) -> &[LaneConfig] {
        &self.lanes
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// First lane whose region contains `point`. Lanes without a region are
    /// skipped since they match everywhere.
    pub fn lane_for_point(&self, point: Point) -> Option<&str> {
        let named: Vec<(&str, Region)> = self
            .lanes
            .iter()
            .filter_map(|lane| lane.region.clone().map(|r| (lane.lane_id.as_str(), r)))
            .collect();
        let name = geometry::assign_region(point, &named)?;
        self.lanes
            .iter()
            .find(|lane| lane.lane_id == name)
            .map(|lane| lane.lane_id.as_str())
    }
}

fn lane_from_entry(index: usize, entry: LaneFileEntry) -> Result<LaneConfig> {
    let lane_id = match entry.lane_id {
        Some(LaneIdFile::Int(n)) => n.to_string(),
        Some(LaneIdFile::Str(s)) => s.trim().to_string(),
        None => return Err(anyhow!("lane #{} has no lane_id", index)),
    };
    let region = match (entry.region, entry.polygon) {
        (Some(_), Some(_)) => {
            return Err(anyhow!(
                "lane '{}' sets both region and polygon",
                lane_id
            ))
        }
        (Some(RegionFile::Polygon { pts }), None) => polygon_region(&pts),
        (Some(RegionFile::Bbox { bbox: [x1, y1, x2, y2] }), None) => {
            Region::bbox(x1, y1, x2, y2).map(Some)
        }
        (None, Some(pts)) => polygon_region(&pts),
        (None, None) => Ok(None),
    }
    .with_context(|| format!("lane '{}' has a malformed region", lane_id))?;

    let source = entry.path.filter(|p| !p.trim().is_empty());
    Ok(LaneConfig {
        lane_id,
        region,
        source,
    })
}
