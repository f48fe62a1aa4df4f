//! # Field Extraction
//!
//! Reads named values out of a decoded packet and turns them into line
//! protocol field values.
//!
//! Values of the wrong shape are treated like missing ones, so a single odd
//! field never stops the rest of the packet from being written.

use serde_json::Value;

use crate::aprs::protocol::DecodedPacket;
use crate::influx::FieldValue;
use crate::telemetry::ScalingStore;

/// Weather readings copied from the `weather` sub-mapping, in output order
pub const WEATHER_KEYS: [&str; 9] = [
    "humidity",
    "pressure",
    "rain_1h",
    "rain_24h",
    "rain_since_midnight",
    "temperature",
    "wind_direction",
    "wind_gust",
    "wind_speed",
];

/// Numeric field, written bare
///
/// # Arguments
///
/// * `packet` - Decoded packet
/// * `key` - Field name in the packet
/// * `default` - Value written when the field is absent
///
/// # Returns
///
/// * `Option<FieldValue>` - The number, the default, or `None` if the field
///   is absent without default or not a number
pub fn numeric(packet: &DecodedPacket, key: &str, default: Option<&str>) -> Option<FieldValue> {
    match packet.get(key) {
        None | Some(Value::Null) => default.map(|d| FieldValue::Number(d.to_string())),
        Some(value) => number(value),
    }
}

/// Identity and extra fields, written quoted
///
/// Strings are used as they are; numbers and booleans use their JSON text.
pub fn quoted(packet: &DecodedPacket, key: &str) -> Option<FieldValue> {
    match packet.get(key)? {
        Value::String(s) if !s.is_empty() => Some(FieldValue::Text(s.clone())),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        _ => None,
    }
}

/// Free text field; empty text is omitted
pub fn text(packet: &DecodedPacket, key: &str) -> Option<FieldValue> {
    packet
        .get_str(key)
        .filter(|s| !s.is_empty())
        .map(|s| FieldValue::Text(s.to_string()))
}

/// The digipeater path, comma-joined
pub fn path(packet: &DecodedPacket) -> Option<FieldValue> {
    let hops = packet
        .get("path")?
        .as_array()?
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()?;

    if hops.is_empty() {
        return None;
    }
    Some(FieldValue::Text(hops.join(",")))
}

/// Telemetry fields: `seq`, `bits` and scaled `analog1`..`analog5`
///
/// Analog values are scaled with the source station's coefficients.
pub fn telemetry(packet: &DecodedPacket, scaling: &ScalingStore) -> Vec<(String, FieldValue)> {
    let Some(telemetry) = packet.get("telemetry").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    for key in ["seq", "bits"] {
        if let Some(value) = telemetry.get(key).and_then(verbatim) {
            fields.push((key.to_string(), value));
        }
    }

    let station = packet.source();
    if let Some(vals) = telemetry.get("vals").and_then(Value::as_array) {
        for (channel, raw) in vals.iter().take(5).enumerate() {
            let Some(raw) = raw.as_f64() else { continue };
            let scaled = match station {
                Some(station) => scaling.scale(station, channel, raw),
                None => raw,
            };
            if let Some(value) = FieldValue::float(scaled) {
                fields.push((format!("analog{}", channel + 1), value));
            }
        }
    }

    fields
}

/// Weather fields, unscaled
pub fn weather(packet: &DecodedPacket) -> Vec<(String, FieldValue)> {
    let Some(weather) = packet.get("weather").and_then(Value::as_object) else {
        return Vec::new();
    };

    WEATHER_KEYS
        .iter()
        .filter_map(|key| Some((key.to_string(), number(weather.get(*key)?)?)))
        .collect()
}

fn number(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => Some(FieldValue::Number(n.to_string())),
        _ => None,
    }
}

/// Numbers bare, strings quoted
fn verbatim(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => Some(FieldValue::Number(n.to_string())),
        Value::String(s) if !s.is_empty() => Some(FieldValue::Text(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Coefficients;
    use serde_json::json;

    fn packet(value: Value) -> DecodedPacket {
        DecodedPacket::from_value(value).unwrap()
    }

    fn number_field(text: &str) -> FieldValue {
        FieldValue::Number(text.to_string())
    }

    #[test]
    fn test_numeric_keeps_json_text() {
        let p = packet(json!({"latitude": 40.0, "longitude": -105.0, "course": 88}));
        assert_eq!(numeric(&p, "latitude", None), Some(number_field("40.0")));
        assert_eq!(numeric(&p, "longitude", None), Some(number_field("-105.0")));
        assert_eq!(numeric(&p, "course", None), Some(number_field("88")));
    }

    #[test]
    fn test_numeric_default() {
        let p = packet(json!({"altitude": null}));
        assert_eq!(numeric(&p, "altitude", Some("0")), Some(number_field("0")));
        assert_eq!(numeric(&p, "speed", Some("0")), Some(number_field("0")));
        assert_eq!(numeric(&p, "course", None), None);
    }

    #[test]
    fn test_numeric_wrong_shape_omitted() {
        let p = packet(json!({"altitude": "high", "speed": [1]}));
        assert_eq!(numeric(&p, "altitude", Some("0")), None);
        assert_eq!(numeric(&p, "speed", None), None);
    }

    #[test]
    fn test_quoted() {
        let p = packet(json!({"to": "APRS", "messagecapable": true, "rng": 12, "via": "", "x": {}}));
        assert_eq!(quoted(&p, "to"), Some(FieldValue::Text("APRS".to_string())));
        assert_eq!(quoted(&p, "messagecapable"), Some(FieldValue::Text("true".to_string())));
        assert_eq!(quoted(&p, "rng"), Some(FieldValue::Text("12".to_string())));
        assert_eq!(quoted(&p, "via"), None, "empty text omitted");
        assert_eq!(quoted(&p, "x"), None);
        assert_eq!(quoted(&p, "missing"), None);
    }

    #[test]
    fn test_text() {
        let p = packet(json!({"comment": "say \"hi\"", "status": "", "raw": 5}));
        assert_eq!(
            text(&p, "comment").unwrap().to_line_protocol(),
            "\"say \\\"hi\\\"\""
        );
        assert_eq!(text(&p, "status"), None);
        assert_eq!(text(&p, "raw"), None);
    }

    #[test]
    fn test_path() {
        let p = packet(json!({"path": ["WIDE1-1", "WIDE2-1"]}));
        assert_eq!(path(&p), Some(FieldValue::Text("WIDE1-1,WIDE2-1".to_string())));

        assert_eq!(path(&packet(json!({"path": []}))), None);
        assert_eq!(path(&packet(json!({"path": ["WIDE1-1", 2]}))), None);
        assert_eq!(path(&packet(json!({"path": "WIDE1-1"}))), None);
        assert_eq!(path(&packet(json!({}))), None);
    }

    #[test]
    fn test_telemetry_identity_scaling() {
        let p = packet(json!({"from": "N0CALL", "telemetry": {"seq": 7, "vals": [3, 0, 255], "bits": 129}}));
        let fields = telemetry(&p, &ScalingStore::new());

        assert_eq!(
            fields,
            vec![
                ("seq".to_string(), number_field("7")),
                ("bits".to_string(), number_field("129")),
                ("analog1".to_string(), number_field("3")),
                ("analog2".to_string(), number_field("0")),
                ("analog3".to_string(), number_field("255")),
            ]
        );
    }

    #[test]
    fn test_telemetry_scaled() {
        let mut store = ScalingStore::new();
        let mut coefficients = [Coefficients::identity(); 5];
        coefficients[0] = Coefficients::new(1.0, 0.0, 0.0);
        coefficients[1] = Coefficients::new(0.0, 0.5, 0.0);
        store.set("W1AW", coefficients);

        let p = packet(json!({"from": "W1AW", "telemetry": {"vals": [3, 5]}}));
        let fields = telemetry(&p, &store);

        assert_eq!(fields[0], ("analog1".to_string(), number_field("9")));
        assert_eq!(fields[1], ("analog2".to_string(), number_field("2.5")));
    }

    #[test]
    fn test_telemetry_caps_at_five_channels() {
        let p = packet(json!({"telemetry": {"vals": [1, 2, 3, 4, 5, 6, 7]}}));
        let fields = telemetry(&p, &ScalingStore::new());
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[4].0, "analog5");
    }

    #[test]
    fn test_telemetry_bit_string() {
        let p = packet(json!({"telemetry": {"bits": "01101001"}}));
        let fields = telemetry(&p, &ScalingStore::new());
        assert_eq!(fields, vec![("bits".to_string(), FieldValue::Text("01101001".to_string()))]);
    }

    #[test]
    fn test_weather_keys_in_order() {
        let p = packet(json!({"weather": {
            "wind_speed": 1.79,
            "temperature": 25.0,
            "humidity": 50,
            "luminosity": 300,
            "pressure": "bad",
        }}));
        let keys: Vec<String> = weather(&p).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["humidity", "temperature", "wind_speed"]);
    }
}
