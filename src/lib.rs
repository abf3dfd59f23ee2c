//! GPS + inertial sensor fusion engine.
//!
//! Streams a CSV of sensor samples through three coupled pipelines per
//! epoch — GNSS frame conversion, INS dead reckoning and a loosely-coupled
//! 15-state error-state Kalman filter — and emits a per-epoch analysis CSV
//! plus one KML track per system.

pub mod attitude;
pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod frames;
pub mod io;
pub mod monitor;
pub mod navdata;
pub mod systems;
pub mod types;

pub use config::{Args, Config};
pub use engine::Engine;
pub use error::NavError;
