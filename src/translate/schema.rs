//! # Per-Format Schemas
//!
//! Which packet fields each format writes, and how.
//!
//! | Format | Numeric | Quoted | Text | Telemetry | Weather |
//! |--------|---------|--------|------|-----------|---------|
//! | uncompressed | position | to, messagecapable, phg, rng, via | comment, raw, symbol, symbol_table, raw_timestamp | yes | yes |
//! | mic-e | position | via, to, mbits, mtype, daodatumbyte | comment, raw, symbol, symbol_table | | |
//! | object | position, timestamp | alive, via, to, object_format, object_name, rng, daodatumbyte | comment, raw, symbol, symbol_table, raw_timestamp | yes | |
//! | compressed | position, gpsfixstatus, timestamp | to, messagecapable, phg, via | comment, raw, symbol, symbol_table | yes | yes |
//! | status | timestamp | via, to | status, raw, raw_timestamp | yes | |
//! | wx | | to, via | comment, raw, wx_raw_timestamp | | yes |
//! | beacon | | to, via | text, raw | | |
//! | bulletin | | to, via, bid | message_text, identifier, raw | | |
//! | message | | to, via, addresse, msgNo | message_text, response, raw | | |
//!
//! Every format also writes `path`, between the quoted and text fields.
//! The four position formats may also carry a `geohash` tag.

use crate::aprs::protocol::PacketFormat;

/// A numeric field with optional output name and default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericField {
    /// Key in the decoded packet
    pub key: &'static str,
    /// Field name in the line
    pub output: &'static str,
    /// Written when the packet lacks the field
    pub default: Option<&'static str>,
}

const fn num(key: &'static str) -> NumericField {
    NumericField {
        key,
        output: key,
        default: None,
    }
}

const fn zero(key: &'static str) -> NumericField {
    NumericField {
        key,
        output: key,
        default: Some("0"),
    }
}

const fn renamed_zero(key: &'static str, output: &'static str) -> NumericField {
    NumericField {
        key,
        output,
        default: Some("0"),
    }
}

/// Field selection for one packet format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub format: PacketFormat,
    pub numeric: &'static [NumericField],
    pub quoted: &'static [&'static str],
    pub text: &'static [&'static str],
    pub telemetry: bool,
    pub weather: bool,
    /// Tag the line with the geohash of the position
    pub geohash: bool,
}

const UNCOMPRESSED: Schema = Schema {
    format: PacketFormat::Uncompressed,
    numeric: &[
        zero("latitude"),
        zero("longitude"),
        renamed_zero("posambiguity", "posAmbiguity"),
        zero("altitude"),
        zero("speed"),
        num("course"),
    ],
    quoted: &["to", "messagecapable", "phg", "rng", "via"],
    text: &["comment", "raw", "symbol", "symbol_table", "raw_timestamp"],
    telemetry: true,
    weather: true,
    geohash: true,
};

const MIC_E: Schema = Schema {
    format: PacketFormat::MicE,
    numeric: &[
        zero("latitude"),
        zero("longitude"),
        renamed_zero("posambiguity", "posAmbiguity"),
        zero("altitude"),
        zero("speed"),
        num("course"),
    ],
    quoted: &["via", "to", "mbits", "mtype", "daodatumbyte"],
    text: &["comment", "raw", "symbol", "symbol_table"],
    telemetry: false,
    weather: false,
    geohash: true,
};

const OBJECT: Schema = Schema {
    format: PacketFormat::Object,
    numeric: &[
        zero("latitude"),
        zero("longitude"),
        renamed_zero("posambiguity", "posAmbiguity"),
        zero("speed"),
        num("course"),
        num("timestamp"),
        zero("altitude"),
    ],
    quoted: &["alive", "via", "to", "object_format", "object_name", "rng", "daodatumbyte"],
    text: &["comment", "raw", "symbol", "symbol_table", "raw_timestamp"],
    telemetry: true,
    weather: false,
    geohash: true,
};

const COMPRESSED: Schema = Schema {
    format: PacketFormat::Compressed,
    numeric: &[
        zero("latitude"),
        zero("longitude"),
        num("gpsfixstatus"),
        zero("altitude"),
        zero("speed"),
        num("course"),
        num("timestamp"),
    ],
    quoted: &["to", "messagecapable", "phg", "via"],
    text: &["comment", "raw", "symbol", "symbol_table"],
    telemetry: true,
    weather: true,
    geohash: true,
};

const STATUS: Schema = Schema {
    format: PacketFormat::Status,
    numeric: &[num("timestamp")],
    quoted: &["via", "to"],
    text: &["status", "raw", "raw_timestamp"],
    telemetry: true,
    weather: false,
    geohash: false,
};

const WX: Schema = Schema {
    format: PacketFormat::Wx,
    numeric: &[],
    quoted: &["to", "via"],
    text: &["comment", "raw", "wx_raw_timestamp"],
    telemetry: false,
    weather: true,
    geohash: false,
};

const BEACON: Schema = Schema {
    format: PacketFormat::Beacon,
    numeric: &[],
    quoted: &["to", "via"],
    text: &["text", "raw"],
    telemetry: false,
    weather: false,
    geohash: false,
};

const BULLETIN: Schema = Schema {
    format: PacketFormat::Bulletin,
    numeric: &[],
    quoted: &["to", "via", "bid"],
    text: &["message_text", "identifier", "raw"],
    telemetry: false,
    weather: false,
    geohash: false,
};

const MESSAGE: Schema = Schema {
    format: PacketFormat::Message,
    numeric: &[],
    quoted: &["to", "via", "addresse", "msgNo"],
    text: &["message_text", "response", "raw"],
    telemetry: false,
    weather: false,
    geohash: false,
};

/// Schema for a format
///
/// Returns `None` for `telemetry-message`, which updates scaling instead of
/// producing a line.
pub fn for_format(format: PacketFormat) -> Option<&'static Schema> {
    match format {
        PacketFormat::Uncompressed => Some(&UNCOMPRESSED),
        PacketFormat::MicE => Some(&MIC_E),
        PacketFormat::Object => Some(&OBJECT),
        PacketFormat::Compressed => Some(&COMPRESSED),
        PacketFormat::Status => Some(&STATUS),
        PacketFormat::Wx => Some(&WX),
        PacketFormat::Beacon => Some(&BEACON),
        PacketFormat::Bulletin => Some(&BULLETIN),
        PacketFormat::Message => Some(&MESSAGE),
        PacketFormat::TelemetryMessage => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_line_format_has_schema() {
        for format in PacketFormat::ALL {
            let schema = for_format(format);
            if format == PacketFormat::TelemetryMessage {
                assert!(schema.is_none());
            } else {
                assert_eq!(schema.map(|s| s.format), Some(format));
            }
        }
    }

    #[test]
    fn test_position_defaults() {
        let schema = for_format(PacketFormat::Uncompressed).unwrap();
        let defaulted: Vec<&str> = schema
            .numeric
            .iter()
            .filter(|f| f.default.is_some())
            .map(|f| f.output)
            .collect();
        assert_eq!(defaulted, vec!["latitude", "longitude", "posAmbiguity", "altitude", "speed"]);
    }

    #[test]
    fn test_no_duplicate_output_keys() {
        for format in PacketFormat::ALL {
            let Some(schema) = for_format(format) else { continue };
            let mut keys: Vec<&str> = schema.numeric.iter().map(|f| f.output).collect();
            keys.extend(schema.quoted);
            keys.extend(schema.text);
            let count = keys.len();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), count, "duplicate key in {}", format);
        }
    }

    #[test]
    fn test_geohash_only_for_position_formats() {
        let tagged: Vec<PacketFormat> = PacketFormat::ALL
            .into_iter()
            .filter(|f| for_format(*f).is_some_and(|s| s.geohash))
            .collect();
        assert_eq!(
            tagged,
            vec![
                PacketFormat::Uncompressed,
                PacketFormat::MicE,
                PacketFormat::Object,
                PacketFormat::Compressed,
            ]
        );
    }
}
