//! Lane regions and point containment.
//!
//! Regions live in image-pixel coordinates. A lane without a region matches
//! every point, so callers carry regions as `Option<Region>`.
//!
//! Polygon containment uses the half-open crossing rule: an edge is crossed
//! only when its endpoints straddle the ray, with the lower endpoint
//! inclusive and the upper one exclusive. Horizontal edges never straddle and
//! so never reach the intersection division. For an axis-aligned polygon,
//! points on the bottom/left boundary count as inside and points on the
//! top/right boundary count as outside.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A point in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box `(x1, y1, x2, y2)`.
///
/// Serialized as a 4-element array, which is how detectors report boxes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a box, swapping coordinates so that `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Bounding-box center, the representative point of a detection.
    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 + self.x2) / 2.0,
            y: (self.y1 + self.y2) / 2.0,
        }
    }

    /// Inclusive range test on both axes.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    /// Clamp the box into a `width` x `height` frame. Box coordinates are
    /// continuous, so an edge-touching box keeps `x2 == width`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = width as f64;
        let max_y = height as f64;
        Self {
            x1: self.x1.clamp(0.0, max_x),
            y1: self.y1.clamp(0.0, max_y),
            x2: self.x2.clamp(0.0, max_x),
            y2: self.y2.clamp(0.0, max_y),
        }
    }

    fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A lane's region of interest.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    Polygon(Vec<Point>),
    Box(BoundingBox),
}

impl Region {
    /// Build a polygon region. Fewer than three vertices is a configuration
    /// error; use `None` for "no region".
    pub fn polygon(points: Vec<Point>) -> Result<Self> {
        if points.len() < 3 {
            return Err(anyhow!(
                "polygon region needs at least 3 vertices, got {}",
                points.len()
            ));
        }
        if !points.iter().all(Point::is_finite) {
            return Err(anyhow!("polygon region has a non-finite vertex"));
        }
        Ok(Region::Polygon(points))
    }

    /// Build a box region. Unlike `BoundingBox::new`, inverted corners are
    /// rejected rather than swapped.
    pub fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        let b = BoundingBox { x1, y1, x2, y2 };
        if !b.is_finite() {
            return Err(anyhow!("box region has a non-finite coordinate"));
        }
        if x1 > x2 || y1 > y2 {
            return Err(anyhow!(
                "box region must satisfy x1 <= x2 and y1 <= y2, got [{}, {}, {}, {}]",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Region::Box(b))
    }

    pub fn contains(&self, point: Point) -> bool {
        match self {
            Region::Polygon(pts) => point_in_polygon(point, pts),
            Region::Box(b) => b.contains(point),
        }
    }
}

/// Containment test with "absent region matches everything".
pub fn contains(point: Point, region: Option<&Region>) -> bool {
    region.map_or(true, |r| r.contains(point))
}

/// Ray-casting parity test.
pub fn point_in_polygon(point: Point, pts: &[Point]) -> bool {
    if pts.is_empty() {
        return true;
    }
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (pi, pj) = (pts[i], pts[j]);
        // Straddle check is false for horizontal edges (pi.y == pj.y).
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Name of the first region in `regions` that contains `point`.
pub fn assign_region<'a, S: AsRef<str>>(
    point: Point,
    regions: &'a [(S, Region)],
) -> Option<&'a str> {
    regions
        .iter()
        .find(|(_, region)| region.contains(point))
        .map(|(name, _)| name.as_ref())
}
