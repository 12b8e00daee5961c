//! Geographic primitives.
//!
//! - [`BoundingBox`]: normalised south/west/north/east viewport rectangles and the
//!   containment/overlap tests the region cache relies on
//! - [`sphere`]: great-circle arcs, heading projections and haversine distance
//!   used for the selected-aircraft overlay

mod bounds;
pub mod sphere;

pub use bounds::{BoundingBox, Coverage};
pub use sphere::{great_circle_arc, haversine_km, project_heading, LonLat};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Metres per degree of latitude (flat-earth approximation).
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;
