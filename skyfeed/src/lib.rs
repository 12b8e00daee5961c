//! SkyFeed - live aircraft positions from a rate-limited public feed
//!
//! This library keeps aircraft telemetry fresh for many concurrent map viewers
//! while the upstream OpenSky feed refreshes only every few seconds and throttles
//! aggressively.
//!
//! # Freshness pipeline
//!
//! ```text
//! CredentialCache ─► FlightService ─► opensky normalizer ─► RegionCache
//!                        (server)                              │
//!                                                              ▼
//!   RenderFrame ◄── InterpolationEngine ◄── FlightPoller ◄── /api/flights
//!                        (client)
//! ```
//!
//! Server side, [`service::FlightService`] answers bounding-box queries from a
//! quantized region cache, falls back to the best covering/overlapping snapshot
//! when the upstream is throttled or failing, and never lets an upstream error
//! escape as anything but a labelled, possibly empty, result.
//!
//! Client side, [`client::FlightPoller`] runs one self-rescheduling poll loop per
//! viewport and [`interpolation::InterpolationEngine`] dead-reckons every aircraft
//! at a fixed frame rate so the picture keeps moving between polls.

pub mod app;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod flight;
pub mod geo;
pub mod interpolation;
pub mod logging;
pub mod provider;
pub mod route;
pub mod server;
pub mod service;

/// Crate version, reported by the CLI and the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
