//! Bounding boxes for map viewports.

use serde::{Deserialize, Serialize};

/// A south/west/north/east rectangle in degrees.
///
/// On the wire the edges use the OpenSky query names (`lamin`, `lomin`,
/// `lamax`, `lomax`). Values built through [`BoundingBox::normalized`] always
/// satisfy `south <= north` and `west <= east` and lie inside the valid
/// latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "lamin")]
    pub south: f64,
    #[serde(rename = "lomin")]
    pub west: f64,
    #[serde(rename = "lamax")]
    pub north: f64,
    #[serde(rename = "lomax")]
    pub east: f64,
}

/// How a cached region relates to a requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// The cached region fully contains the request.
    Covers,
    /// The regions intersect but the cached one does not contain the request.
    Overlaps,
    /// No intersection.
    Disjoint,
}

impl Default for BoundingBox {
    /// Central Europe, the viewport used when a query omits its bounds.
    fn default() -> Self {
        Self {
            south: 45.0,
            west: 5.0,
            north: 55.0,
            east: 25.0,
        }
    }
}

impl BoundingBox {
    /// Build a box from raw edges, reordering min/max pairs before clamping.
    pub fn normalized(lamin: f64, lomin: f64, lamax: f64, lomax: f64) -> Self {
        Self {
            south: lamin.min(lamax).clamp(-90.0, 90.0),
            west: lomin.min(lomax).clamp(-180.0, 180.0),
            north: lamin.max(lamax).clamp(-90.0, 90.0),
            east: lomin.max(lomax).clamp(-180.0, 180.0),
        }
    }

    /// Inclusive point containment.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }

    /// True if `self` fully contains `other`.
    pub fn covers(&self, other: &BoundingBox) -> bool {
        self.south <= other.south
            && self.west <= other.west
            && self.north >= other.north
            && self.east >= other.east
    }

    /// True if the two boxes share at least one point.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.north < other.south
            || self.south > other.north
            || self.east < other.west
            || self.west > other.east)
    }

    /// Classify this (cached) box against a requested box.
    pub fn coverage_of(&self, request: &BoundingBox) -> Coverage {
        if self.covers(request) {
            Coverage::Covers
        } else if self.intersects(request) {
            Coverage::Overlaps
        } else {
            Coverage::Disjoint
        }
    }

    /// True if any edge moved by at least `epsilon` degrees.
    pub fn differs_from(&self, other: &BoundingBox, epsilon: f64) -> bool {
        // Tolerate binary rounding so 45.00 -> 45.01 counts as a 0.01 move.
        let threshold = epsilon - 1e-9;
        (self.south - other.south).abs() >= threshold
            || (self.west - other.west).abs() >= threshold
            || (self.north - other.north).abs() >= threshold
            || (self.east - other.east).abs() >= threshold
    }

    /// Query parameters with two-decimal precision, in wire order.
    pub fn to_query(&self) -> [(&'static str, String); 4] {
        [
            ("lamin", format!("{:.2}", self.south)),
            ("lomin", format!("{:.2}", self.west)),
            ("lamax", format!("{:.2}", self.north)),
            ("lomax", format!("{:.2}", self.east)),
        ]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.2},{:.2} .. {:.2},{:.2}]",
            self.south, self.west, self.north, self.east
        )
    }
}
