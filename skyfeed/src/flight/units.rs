//! Unit conversions for display.

pub const METERS_TO_FEET: f64 = 3.28084;
pub const METERS_PER_SECOND_TO_KNOTS: f64 = 1.94384;
pub const METERS_PER_SECOND_TO_FEET_PER_MINUTE: f64 = 196.850394;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * METERS_TO_FEET
}

pub fn mps_to_knots(mps: f64) -> f64 {
    mps * METERS_PER_SECOND_TO_KNOTS
}

pub fn mps_to_feet_per_minute(mps: f64) -> f64 {
    mps * METERS_PER_SECOND_TO_FEET_PER_MINUTE
}
