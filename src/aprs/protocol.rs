//! # APRS-IS Protocol Constants and Types
//!
//! Core definitions shared by the feed decoder, the translators and the
//! session driver.

use serde_json::{Map, Value};

/// Default APRS-IS rotation host
pub const APRS_IS_DEFAULT_HOST: &str = "rotate.aprs.net";

/// Default APRS-IS filtered-feed port
pub const APRS_IS_DEFAULT_PORT: u16 = 10152;

/// Software name announced in the login line and the heartbeat
pub const SOFTWARE_NAME: &str = "aprs2influxdb";

/// Callsign APRS-IS ignores for login purposes
pub const NOCALL: &str = "NOCALL";

/// Passcode sent for receive-only logins
pub const RECEIVE_ONLY_PASSCODE: i32 = -1;

/// Prefix of server comment lines (banner, keepalives, logresp)
pub const SERVER_COMMENT_PREFIX: char = '#';

/// Number of analog telemetry channels
pub const TELEMETRY_CHANNELS: usize = 5;

/// Packet formats that have a translation into line protocol.
///
/// The discriminator names match the `format` values produced by the
/// decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketFormat {
    Uncompressed,
    MicE,
    Object,
    Compressed,
    Status,
    Wx,
    Beacon,
    Bulletin,
    Message,
    /// PARM/UNIT/EQNS/BITS definitions; only EQNS carries data we use
    TelemetryMessage,
}

impl PacketFormat {
    /// Every translatable format, in dispatch order
    pub const ALL: [PacketFormat; 10] = [
        PacketFormat::Uncompressed,
        PacketFormat::MicE,
        PacketFormat::Object,
        PacketFormat::Compressed,
        PacketFormat::Status,
        PacketFormat::Wx,
        PacketFormat::Beacon,
        PacketFormat::Bulletin,
        PacketFormat::Message,
        PacketFormat::TelemetryMessage,
    ];

    /// Look up a format by its discriminator name
    ///
    /// Returns `None` for names with no translation defined.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.as_str() == name)
    }

    /// The discriminator name as it appears in the `format` field
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketFormat::Uncompressed => "uncompressed",
            PacketFormat::MicE => "mic-e",
            PacketFormat::Object => "object",
            PacketFormat::Compressed => "compressed",
            PacketFormat::Status => "status",
            PacketFormat::Wx => "wx",
            PacketFormat::Beacon => "beacon",
            PacketFormat::Bulletin => "bulletin",
            PacketFormat::Message => "message",
            PacketFormat::TelemetryMessage => "telemetry-message",
        }
    }
}

impl std::fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded APRS frame.
///
/// A mapping from field name to a JSON-like value. The shape depends on the
/// `format` discriminator; every field is optional from the translator's
/// point of view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPacket {
    fields: Map<String, Value>,
}

impl DecodedPacket {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a packet from a JSON object
    ///
    /// Returns `None` if `value` is not an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use aprs2influxdb::aprs::protocol::DecodedPacket;
    /// use serde_json::json;
    ///
    /// let packet = DecodedPacket::from_value(json!({"format": "status", "from": "N0CALL"})).unwrap();
    /// assert_eq!(packet.format(), Some("status"));
    /// assert!(DecodedPacket::from_value(json!([1, 2, 3])).is_none());
    /// ```
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field if it holds a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// The `format` discriminator, if present and a string
    pub fn format(&self) -> Option<&str> {
        self.get_str("format")
    }

    /// The originating station (`from`)
    pub fn source(&self) -> Option<&str> {
        self.get_str("from")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for DecodedPacket {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_names_round_trip() {
        for format in PacketFormat::ALL {
            assert_eq!(PacketFormat::from_name(format.as_str()), Some(format));
        }
    }

    #[test]
    fn test_unknown_format_names() {
        assert_eq!(PacketFormat::from_name("telemetry"), None);
        assert_eq!(PacketFormat::from_name("MIC-E"), None);
        assert_eq!(PacketFormat::from_name(""), None);
    }

    #[test]
    fn test_format_display() {
        assert_eq!(PacketFormat::MicE.to_string(), "mic-e");
        assert_eq!(PacketFormat::TelemetryMessage.to_string(), "telemetry-message");
    }

    #[test]
    fn test_packet_accessors() {
        let mut packet = DecodedPacket::new();
        assert!(packet.is_empty());

        packet.insert("format", "uncompressed");
        packet.insert("from", "W1AW");
        packet.insert("latitude", 41.7);

        assert_eq!(packet.len(), 3);
        assert_eq!(packet.format(), Some("uncompressed"));
        assert_eq!(packet.source(), Some("W1AW"));
        assert_eq!(packet.get("latitude"), Some(&json!(41.7)));
        assert_eq!(packet.get_str("latitude"), None, "numbers are not strings");
        assert!(packet.contains("from"));

        assert_eq!(packet.remove("from"), Some(json!("W1AW")));
        assert_eq!(packet.source(), None);
    }

    #[test]
    fn test_non_string_format_is_absent() {
        let packet = DecodedPacket::from_value(json!({"format": 7})).unwrap();
        assert_eq!(packet.format(), None);
    }
}
