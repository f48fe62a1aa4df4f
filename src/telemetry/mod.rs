//! # Telemetry Module
//!
//! Per-station analog telemetry scaling.
//!
//! Stations announce `EQNS.` coefficients in telemetry definition messages;
//! later telemetry reports from the same station are scaled with them.

pub mod scaling;

pub use scaling::{Coefficients, ScalingStore};
