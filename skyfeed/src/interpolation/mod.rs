//! Dead-reckoning interpolation.
//!
//! The feed refreshes every few seconds; drawn naively, aircraft would jump
//! once per poll. The engine instead extrapolates every aircraft from its last
//! reported position, speed and heading on every frame:
//!
//! ```text
//! FlightDataState ──┐
//! TrackedFlight ────┼──► InterpolationEngine ──(30 Hz)──► RenderFrame (watch)
//! SelectionInput ───┘         │
//!                             └── PositionHistory (trail)
//! ```
//!
//! [`render_frame`] is pure, so the same snapshot at the same instant always
//! produces the same geometry.

mod dead_reckoning;
mod engine;
mod frame;

pub use dead_reckoning::{
    degrees_per_second, elapsed_secs, extrapolate, project, Extrapolated, MAX_EXTRAPOLATION_SECS,
};
pub use engine::{EngineHandle, InterpolationEngine, SelectionInput, DEFAULT_FPS};
pub use frame::{render_frame, AircraftMarker, PathOverlay, RenderFrame, SelectedOverlay, Selection};
