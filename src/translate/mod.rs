//! # Translate Module
//!
//! Turns decoded packets into InfluxDB line protocol.
//!
//! ## Line Layout
//!
//! ```text
//! packet,from=W1AW,format=uncompressed latitude=41.714,longitude=-72.7273,...
//! ```
//!
//! - Tags: `from`, `format`, and `geohash` on positions when enabled
//! - Fields, in order: numeric, quoted, `path`, text, telemetry, weather
//!
//! The first write of a key wins, and a packet with no usable fields
//! produces no line.
//!
//! ## Usage
//!
//! ```
//! use aprs2influxdb::aprs::protocol::DecodedPacket;
//! use aprs2influxdb::translate::Translator;
//! use serde_json::json;
//!
//! let mut translator = Translator::default();
//! let packet = DecodedPacket::from_value(json!({
//!     "format": "status",
//!     "from": "N0CALL",
//!     "status": "QRV",
//! })).unwrap();
//!
//! assert_eq!(
//!     translator.translate(&packet).as_deref(),
//!     Some("packet,from=N0CALL,format=status status=\"QRV\"")
//! );
//! ```

pub mod extract;
pub mod schema;

use geohash::Coord;
use tracing::debug;

use crate::aprs::protocol::{DecodedPacket, PacketFormat};
use crate::config::TranslateConfig;
use crate::influx::LineBuilder;
use crate::telemetry::ScalingStore;
use schema::Schema;

/// Packet to line protocol translator.
///
/// Owns the telemetry scaling store, which `telemetry-message` packets
/// update and telemetry-carrying packets read.
#[derive(Debug, Clone)]
pub struct Translator {
    measurement: String,
    geohash_precision: usize,
    scaling: ScalingStore,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(&TranslateConfig::default())
    }
}

impl Translator {
    pub fn new(config: &TranslateConfig) -> Self {
        Self {
            measurement: config.measurement.clone(),
            geohash_precision: config.geohash_precision,
            scaling: ScalingStore::new(),
        }
    }

    pub fn scaling(&self) -> &ScalingStore {
        &self.scaling
    }

    pub fn scaling_mut(&mut self) -> &mut ScalingStore {
        &mut self.scaling
    }

    /// Translate a packet into one line
    ///
    /// # Returns
    ///
    /// * `Option<String>` - The line, or `None` for packets without a known
    ///   format, telemetry definitions, and packets with no usable fields
    pub fn translate(&mut self, packet: &DecodedPacket) -> Option<String> {
        let Some(name) = packet.format() else {
            debug!("Packet without format: {:?}", packet.get_str("raw"));
            return None;
        };

        let Some(format) = PacketFormat::from_name(name) else {
            debug!("No translation for format {}", name);
            return None;
        };

        match schema::for_format(format) {
            Some(schema) => self.render(schema, packet),
            None => {
                self.scaling.update_from_packet(packet);
                None
            }
        }
    }

    fn render(&self, schema: &Schema, packet: &DecodedPacket) -> Option<String> {
        let mut line = LineBuilder::new(&self.measurement);

        if let Some(from) = packet.source() {
            line.tag("from", from);
        }
        line.tag("format", schema.format.as_str());
        if schema.geohash {
            if let Some(hash) = self.geohash(packet) {
                line.tag("geohash", &hash);
            }
        }

        for field in schema.numeric {
            if let Some(value) = extract::numeric(packet, field.key, field.default) {
                line.field(field.output, value);
            }
        }
        for key in schema.quoted {
            if let Some(value) = extract::quoted(packet, key) {
                line.field(key, value);
            }
        }
        if let Some(path) = extract::path(packet) {
            line.field("path", path);
        }
        for key in schema.text {
            if let Some(value) = extract::text(packet, key) {
                line.field(key, value);
            }
        }
        if schema.telemetry {
            for (key, value) in extract::telemetry(packet, &self.scaling) {
                line.field(&key, value);
            }
        }
        if schema.weather {
            for (key, value) in extract::weather(packet) {
                line.field(&key, value);
            }
        }

        let built = line.build();
        if built.is_none() {
            debug!("No fields to write for {} packet", schema.format);
        }
        built
    }

    fn geohash(&self, packet: &DecodedPacket) -> Option<String> {
        if self.geohash_precision == 0 {
            return None;
        }
        let latitude = packet.get("latitude")?.as_f64()?;
        let longitude = packet.get("longitude")?.as_f64()?;

        match geohash::encode(Coord { x: longitude, y: latitude }, self.geohash_precision) {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!("No geohash for {}, {}: {}", latitude, longitude, e);
                None
            }
        }
    }
}
