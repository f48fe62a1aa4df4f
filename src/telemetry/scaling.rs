//! # Telemetry Scaling
//!
//! Each analog channel is converted with a quadratic:
//!
//! `value = a·v² + b·v + c`
//!
//! - `(0, 1, 0)`: raw value passes through (used for unknown stations)
//! - `(0, 0.5, -10)`: linear scale and offset
//! - `(1, 0, 0)`: square of the raw value
//!
//! ## Usage
//!
//! ```
//! use aprs2influxdb::telemetry::{Coefficients, ScalingStore};
//!
//! let mut store = ScalingStore::new();
//! assert_eq!(store.scale("W1AW", 0, 3.0), 3.0);
//!
//! store.set("W1AW", [Coefficients::new(1.0, 0.0, 0.0); 5]);
//! assert_eq!(store.scale("W1AW", 0, 3.0), 9.0);
//! ```

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::aprs::protocol::{DecodedPacket, TELEMETRY_CHANNELS};

/// Quadratic coefficients for one analog channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::identity()
    }
}

impl Coefficients {
    #[must_use]
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Coefficients that leave the raw value unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            c: 0.0,
        }
    }

    /// Applies `a·v² + b·v + c` to a raw value.
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        self.a * raw * raw + self.b * raw + self.c
    }

    /// Parse an `[a, b, c]` triple
    fn from_value(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [a, b, c] => Some(Self::new(a.as_f64()?, b.as_f64()?, c.as_f64()?)),
            _ => None,
        }
    }
}

/// Scaling coefficients for all five channels of one station
pub type ChannelCoefficients = [Coefficients; TELEMETRY_CHANNELS];

/// Station → channel coefficients.
///
/// Entries are replaced wholesale on each valid update and never removed.
#[derive(Debug, Clone, Default)]
pub struct ScalingStore {
    stations: HashMap<String, ChannelCoefficients>,
}

impl ScalingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the coefficients of a station
    pub fn set(&mut self, station: &str, coefficients: ChannelCoefficients) {
        self.stations.insert(station.to_string(), coefficients);
    }

    pub fn get(&self, station: &str) -> Option<&ChannelCoefficients> {
        self.stations.get(station)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Scale a raw channel value for a station
    ///
    /// Unknown stations and channels beyond the fifth use identity scaling.
    ///
    /// # Arguments
    ///
    /// * `station` - Originating station (`from`)
    /// * `channel` - Zero-based channel index
    /// * `raw` - Raw channel reading
    #[must_use]
    pub fn scale(&self, station: &str, channel: usize, raw: f64) -> f64 {
        self.stations
            .get(station)
            .and_then(|channels| channels.get(channel))
            .copied()
            .unwrap_or_default()
            .apply(raw)
    }

    /// Apply the `tEQNS` definition carried by a telemetry message
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the station's entry was replaced. Packets without
    ///   a source or without exactly five numeric triples leave the store
    ///   untouched.
    pub fn update_from_packet(&mut self, packet: &DecodedPacket) -> bool {
        let Some(station) = packet.source() else {
            debug!("Telemetry definition without source station");
            return false;
        };

        match packet.get("tEQNS").and_then(parse_equations) {
            Some(coefficients) => {
                debug!("Updated telemetry scaling for {}: {:?}", station, coefficients);
                self.set(station, coefficients);
                true
            }
            None => {
                debug!("Ignoring telemetry message from {} without usable EQNS", station);
                false
            }
        }
    }
}

/// Parse `[[a,b,c] × 5]`
fn parse_equations(value: &Value) -> Option<ChannelCoefficients> {
    let triples = value.as_array()?;
    if triples.len() != TELEMETRY_CHANNELS {
        return None;
    }

    let mut coefficients = [Coefficients::identity(); TELEMETRY_CHANNELS];
    for (slot, triple) in coefficients.iter_mut().zip(triples) {
        *slot = Coefficients::from_value(triple)?;
    }
    Some(coefficients)
}
