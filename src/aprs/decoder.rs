//! # APRS Frame Decoder
//!
//! Decodes one TNC2-format line from the APRS-IS feed
//! (`FROM>TO,PATH:body`) into a [`DecodedPacket`].
//!
//! Only the fields the translators consume are decoded; anything else is
//! left in `raw`. Unsupported data types are reported as decode errors.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use super::position::{parse_comment, parse_mic_e, parse_position};
use super::protocol::{DecodedPacket, PacketFormat, TELEMETRY_CHANNELS};
use super::weather::parse_weather;
use crate::error::{BridgeError, Result};

/// Width of the `:ADDRESSEE:` field in messages
const ADDRESSEE_LEN: usize = 9;

/// Width of object names
const OBJECT_NAME_LEN: usize = 9;

/// Width of `DDHHMMz` style timestamps
const TIMESTAMP_LEN: usize = 7;

/// Width of the `MMDDHHMM` positionless weather timestamp
const WX_TIMESTAMP_LEN: usize = 8;

/// A position may start this far into an otherwise unrecognised body
const MAX_POSITION_OFFSET: usize = 40;

/// Decode a feed line into a packet
///
/// # Arguments
///
/// * `line` - One line from the feed, with or without its line terminator
///
/// # Returns
///
/// * `Result<DecodedPacket>` - Decoded packet with at least `from`, `to`,
///   `path`, `raw` and `format`
///
/// # Errors
///
/// Returns a decode error if the header is malformed, the data type is
/// unsupported, or the body does not match its data type.
///
/// # Examples
///
/// ```
/// use aprs2influxdb::aprs::decoder::decode;
///
/// let packet = decode("N0CALL>APRS,WIDE1-1:>Monitoring").unwrap();
/// assert_eq!(packet.format(), Some("status"));
/// assert_eq!(packet.get_str("status"), Some("Monitoring"));
/// ```
pub fn decode(line: &str) -> Result<DecodedPacket> {
    decode_at(line, Utc::now())
}

/// Decode with an explicit "now" for resolving day/hour timestamps
pub fn decode_at(line: &str, now: DateTime<Utc>) -> Result<DecodedPacket> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(BridgeError::Decode("empty frame".to_string()));
    }

    let (header, body) = line
        .split_once(':')
        .ok_or_else(|| BridgeError::Decode("missing header separator".to_string()))?;

    let mut packet = decode_header(header)?;
    packet.insert("raw", line);

    let to = packet.get_str("to").unwrap_or_default().to_string();
    decode_body(&mut packet, &to, body, now)?;

    Ok(packet)
}

/// Parse `FROM>TO,DIGI1,DIGI2`
fn decode_header(header: &str) -> Result<DecodedPacket> {
    let (from, rest) = header
        .split_once('>')
        .ok_or_else(|| BridgeError::Decode(format!("invalid header {:?}", header)))?;

    let mut parts = rest.split(',');
    let to = parts.next().unwrap_or_default();
    let path: Vec<String> = parts.map(str::to_string).collect();

    if from.is_empty() || to.is_empty() {
        return Err(BridgeError::Decode(format!("invalid header {:?}", header)));
    }
    if path.iter().any(String::is_empty) {
        return Err(BridgeError::Decode(format!("empty path element in {:?}", header)));
    }

    let mut packet = DecodedPacket::new();
    packet.insert("from", from);
    packet.insert("to", to);

    // The station after a q-construct is the one that gated the packet
    if path.len() >= 2 {
        let q = &path[path.len() - 2];
        if q.len() == 3 && q.starts_with('q') {
            packet.insert("via", path[path.len() - 1].clone());
        }
    }
    packet.insert("path", path);

    Ok(packet)
}

fn decode_body(packet: &mut DecodedPacket, to: &str, body: &str, now: DateTime<Utc>) -> Result<()> {
    let Some(dti) = body.chars().next() else {
        return Err(BridgeError::Decode("empty body".to_string()));
    };
    let rest = &body[dti.len_utf8()..];

    match dti {
        '!' | '=' => {
            packet.insert("messagecapable", dti == '=');
            decode_position(packet, rest)
        }
        '/' | '@' => {
            packet.insert("messagecapable", dti == '@');
            let rest = take_timestamp(packet, rest, now)?;
            decode_position(packet, rest)
        }
        '>' => decode_status(packet, rest, now),
        ':' => decode_message(packet, rest),
        ';' => decode_object(packet, rest, now),
        '`' | '\'' => {
            packet.insert("format", PacketFormat::MicE.as_str());
            parse_mic_e(packet, to, rest)
        }
        '_' => decode_positionless_weather(packet, rest),
        _ => {
            if let Some(offset) = body.find('!').filter(|i| *i <= MAX_POSITION_OFFSET) {
                packet.insert("messagecapable", false);
                return decode_position(packet, &body[offset + 1..]);
            }
            if to.starts_with("BEACON") {
                packet.insert("format", PacketFormat::Beacon.as_str());
                packet.insert("text", body);
                return Ok(());
            }
            Err(BridgeError::Decode(format!("unsupported data type {:?}", dti)))
        }
    }
}

fn decode_position(packet: &mut DecodedPacket, body: &str) -> Result<()> {
    let kind = parse_position(packet, body)?;
    packet.insert("format", kind.as_str());
    Ok(())
}

/// Split off a 7 character timestamp, recording `raw_timestamp`/`timestamp`
fn take_timestamp<'a>(packet: &mut DecodedPacket, body: &'a str, now: DateTime<Utc>) -> Result<&'a str> {
    let raw = body
        .get(..TIMESTAMP_LEN)
        .ok_or_else(|| BridgeError::Decode("timestamp too short".to_string()))?;

    packet.insert("raw_timestamp", raw);
    if let Some(timestamp) = parse_timestamp(raw, now) {
        packet.insert("timestamp", timestamp);
    }

    Ok(&body[TIMESTAMP_LEN..])
}

/// Resolve `DDHHMMz` (UTC day/time) and `HHMMSSh` (UTC time) timestamps
///
/// Local-time `DDHHMM/` stamps cannot be resolved and yield `None`.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    if raw.len() != TIMESTAMP_LEN || !raw.is_ascii() || !raw[..6].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let a: u32 = raw[0..2].parse().ok()?;
    let b: u32 = raw[2..4].parse().ok()?;
    let c: u32 = raw[4..6].parse().ok()?;

    match &raw[6..] {
        "z" => Utc
            .with_ymd_and_hms(now.year(), now.month(), a, b, c, 0)
            .single()
            .map(|t| t.timestamp()),
        "h" => {
            let time = NaiveTime::from_hms_opt(a, b, c)?;
            Some(now.date_naive().and_time(time).and_utc().timestamp())
        }
        _ => None,
    }
}

fn decode_status(packet: &mut DecodedPacket, body: &str, now: DateTime<Utc>) -> Result<()> {
    packet.insert("format", PacketFormat::Status.as_str());

    let mut text = body;
    if let Some(raw) = body.get(..TIMESTAMP_LEN) {
        if raw.ends_with('z') && raw[..6].chars().all(|c| c.is_ascii_digit()) {
            text = take_timestamp(packet, body, now)?;
        }
    }

    packet.insert("status", text.trim());
    Ok(())
}

/// Messages, bulletins, acks and telemetry definitions (`:ADDRESSEE:text`)
fn decode_message(packet: &mut DecodedPacket, body: &str) -> Result<()> {
    let addressee = body
        .get(..ADDRESSEE_LEN)
        .ok_or_else(|| BridgeError::Decode("message addressee too short".to_string()))?;
    if body.get(ADDRESSEE_LEN..ADDRESSEE_LEN + 1) != Some(":") {
        return Err(BridgeError::Decode("message addressee not terminated".to_string()));
    }
    let text = &body[ADDRESSEE_LEN + 1..];
    let addressee = addressee.trim_end();

    if let Some(bulletin) = addressee.strip_prefix("BLN") {
        return decode_bulletin(packet, bulletin, text);
    }

    packet.insert("addresse", addressee);

    if let Some(equations) = text.strip_prefix("EQNS.") {
        packet.insert("format", PacketFormat::TelemetryMessage.as_str());
        if let Some(eqns) = parse_equations(equations) {
            packet.insert("tEQNS", eqns);
        }
        return Ok(());
    }
    if ["PARM.", "UNIT.", "BITS."].iter().any(|p| text.starts_with(p)) {
        packet.insert("format", PacketFormat::TelemetryMessage.as_str());
        return Ok(());
    }

    packet.insert("format", PacketFormat::Message.as_str());

    for response in ["ack", "rej"] {
        if let Some(number) = text.strip_prefix(response) {
            let number = number.trim_end_matches('}').trim();
            if (1..=5).contains(&number.len()) && number.chars().all(|c| c.is_ascii_alphanumeric()) {
                packet.insert("response", response);
                packet.insert("msgNo", number);
                return Ok(());
            }
        }
    }

    let mut message = text;
    if let Some(index) = text.rfind('{') {
        let number = text[index + 1..].trim_end_matches('}');
        if (1..=5).contains(&number.len()) && number.chars().all(|c| c.is_ascii_alphanumeric()) {
            packet.insert("msgNo", number);
            message = &text[..index];
        }
    }
    packet.insert("message_text", message.trim());

    Ok(())
}

/// `BLNn` bulletins, `BLNnGROUP` group bulletins and `BLNx` announcements
fn decode_bulletin(packet: &mut DecodedPacket, suffix: &str, text: &str) -> Result<()> {
    let mut chars = suffix.chars();
    let bid = chars
        .next()
        .ok_or_else(|| BridgeError::Decode("bulletin without identifier".to_string()))?;
    let identifier = chars.as_str().trim();

    let format = if bid.is_ascii_digit() {
        if identifier.is_empty() {
            PacketFormat::Bulletin.as_str()
        } else {
            "group-bulletin"
        }
    } else {
        "announcement"
    };

    packet.insert("format", format);
    packet.insert("bid", bid.to_string());
    packet.insert("identifier", identifier);
    packet.insert("message_text", text.trim());

    Ok(())
}

/// Parse `a,b,c,a,b,c,...` into five `[a, b, c]` triples
///
/// Returns `None` unless exactly fifteen numeric coefficients are present.
fn parse_equations(text: &str) -> Option<Value> {
    let values: Vec<f64> = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    if values.len() != TELEMETRY_CHANNELS * 3 {
        return None;
    }

    let triples: Vec<Value> = values
        .chunks(3)
        .map(|c| Value::from(c.to_vec()))
        .collect();
    Some(Value::Array(triples))
}

/// `;NAME_____*DDHHMMzPOSITION`
fn decode_object(packet: &mut DecodedPacket, body: &str, now: DateTime<Utc>) -> Result<()> {
    let name = body
        .get(..OBJECT_NAME_LEN)
        .ok_or_else(|| BridgeError::Decode("object name too short".to_string()))?;
    let alive = match body.get(OBJECT_NAME_LEN..OBJECT_NAME_LEN + 1) {
        Some("*") => true,
        Some("_") => false,
        _ => return Err(BridgeError::Decode("invalid object state".to_string())),
    };

    packet.insert("format", PacketFormat::Object.as_str());
    packet.insert("object_name", name.trim_end());
    packet.insert("alive", alive);

    let rest = take_timestamp(packet, &body[OBJECT_NAME_LEN + 1..], now)?;
    let kind = parse_position(packet, rest)?;
    packet.insert("object_format", kind.as_str());

    Ok(())
}

/// `_MMDDHHMMc...s...g...t...`
fn decode_positionless_weather(packet: &mut DecodedPacket, body: &str) -> Result<()> {
    let timestamp = body
        .get(..WX_TIMESTAMP_LEN)
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| BridgeError::Decode("invalid weather timestamp".to_string()))?;

    let (weather, rest) = parse_weather(&body[WX_TIMESTAMP_LEN..], false);
    if weather.is_empty() {
        return Err(BridgeError::Decode("weather report without readings".to_string()));
    }

    packet.insert("format", PacketFormat::Wx.as_str());
    packet.insert("wx_raw_timestamp", timestamp);
    packet.insert("weather", Value::Object(weather));
    parse_comment(packet, rest, false);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_header_and_via() {
        let packet = decode_at("W1AW-9>APRS,WIDE1-1,qAR,KB1LQC:>hi", now()).unwrap();

        assert_eq!(packet.source(), Some("W1AW-9"));
        assert_eq!(packet.get_str("to"), Some("APRS"));
        assert_eq!(packet.get("path"), Some(&json!(["WIDE1-1", "qAR", "KB1LQC"])));
        assert_eq!(packet.get_str("via"), Some("KB1LQC"));
        assert_eq!(packet.get_str("raw"), Some("W1AW-9>APRS,WIDE1-1,qAR,KB1LQC:>hi"));
    }

    #[test]
    fn test_line_terminator_stripped() {
        let packet = decode_at("N0CALL>APRS:>x\r\n", now()).unwrap();
        assert_eq!(packet.get_str("raw"), Some("N0CALL>APRS:>x"));
        assert_eq!(packet.get("path"), Some(&json!([])));
        assert!(!packet.contains("via"));
    }

    #[test]
    fn test_malformed_headers() {
        assert!(decode_at("", now()).is_err());
        assert!(decode_at("no separator", now()).is_err());
        assert!(decode_at("N0CALL:>status", now()).is_err());
        assert!(decode_at(">APRS:>status", now()).is_err());
        assert!(decode_at("N0CALL>APRS,,WIDE:>status", now()).is_err());
        assert!(decode_at("N0CALL>APRS:", now()).is_err());
    }

    #[test]
    fn test_uncompressed_position() {
        let packet = decode_at("N0CALL>APRS,TCPIP*:=4903.50N/07201.75W-Test", now()).unwrap();

        assert_eq!(packet.format(), Some("uncompressed"));
        assert_eq!(packet.get("messagecapable"), Some(&json!(true)));
        assert_eq!(packet.get("latitude"), Some(&json!(49.058333)));
        assert_eq!(packet.get_str("comment"), Some("Test"));
    }

    #[test]
    fn test_position_with_timestamp() {
        let packet = decode_at("N0CALL>APRS:@092345z4903.50N/07201.75W>", now()).unwrap();

        assert_eq!(packet.format(), Some("uncompressed"));
        assert_eq!(packet.get_str("raw_timestamp"), Some("092345z"));
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 23, 45, 0).unwrap().timestamp();
        assert_eq!(packet.get("timestamp"), Some(&json!(expected)));
    }

    #[test]
    fn test_compressed_position() {
        let packet = decode_at("N0CALL>APRS:!/5L!!<*e7>7P[", now()).unwrap();
        assert_eq!(packet.format(), Some("compressed"));
        assert_eq!(packet.get("messagecapable"), Some(&json!(false)));
    }

    #[test]
    fn test_status_with_timestamp() {
        let packet = decode_at("N0CALL>APRS:>092345zNet Control", now()).unwrap();
        assert_eq!(packet.format(), Some("status"));
        assert_eq!(packet.get_str("status"), Some("Net Control"));
        assert_eq!(packet.get_str("raw_timestamp"), Some("092345z"));
    }

    #[test]
    fn test_message_with_number() {
        let packet = decode_at("N0CALL>APRS::W1AW     :Hello there{042", now()).unwrap();

        assert_eq!(packet.format(), Some("message"));
        assert_eq!(packet.get_str("addresse"), Some("W1AW"));
        assert_eq!(packet.get_str("message_text"), Some("Hello there"));
        assert_eq!(packet.get_str("msgNo"), Some("042"));
    }

    #[test]
    fn test_message_ack() {
        let packet = decode_at("N0CALL>APRS::W1AW     :ack042", now()).unwrap();
        assert_eq!(packet.get_str("response"), Some("ack"));
        assert_eq!(packet.get_str("msgNo"), Some("042"));
        assert!(!packet.contains("message_text"));
    }

    #[test]
    fn test_bulletins() {
        let packet = decode_at("N0CALL>APRS::BLN3     :Snow expected", now()).unwrap();
        assert_eq!(packet.format(), Some("bulletin"));
        assert_eq!(packet.get_str("bid"), Some("3"));
        assert_eq!(packet.get_str("identifier"), Some(""));
        assert_eq!(packet.get_str("message_text"), Some("Snow expected"));

        let group = decode_at("N0CALL>APRS::BLN1WX   :Storm", now()).unwrap();
        assert_eq!(group.format(), Some("group-bulletin"));
        assert_eq!(group.get_str("identifier"), Some("WX"));
    }

    #[test]
    fn test_telemetry_equations() {
        let packet = decode_at(
            "W1AW>APRS::W1AW     :EQNS.0,1,0,0,2,0,0,1,5,0,1,0,1,0,0",
            now(),
        )
        .unwrap();

        assert_eq!(packet.format(), Some("telemetry-message"));
        assert_eq!(
            packet.get("tEQNS"),
            Some(&json!([[0.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 1.0, 5.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]))
        );
    }

    #[test]
    fn test_short_telemetry_equations_left_out() {
        let packet = decode_at("W1AW>APRS::W1AW     :EQNS.0,1,0", now()).unwrap();
        assert_eq!(packet.format(), Some("telemetry-message"));
        assert!(!packet.contains("tEQNS"));
    }

    #[test]
    fn test_telemetry_parameter_names() {
        let packet = decode_at("W1AW>APRS::W1AW     :PARM.Battery,Temp", now()).unwrap();
        assert_eq!(packet.format(), Some("telemetry-message"));
    }

    #[test]
    fn test_object() {
        let packet = decode_at("N0CALL>APRS:;LEADER   *092345z4903.50N/07201.75W>088/036", now()).unwrap();

        assert_eq!(packet.format(), Some("object"));
        assert_eq!(packet.get_str("object_name"), Some("LEADER"));
        assert_eq!(packet.get("alive"), Some(&json!(true)));
        assert_eq!(packet.get_str("object_format"), Some("uncompressed"));
        assert_eq!(packet.get("course"), Some(&json!(88)));
    }

    #[test]
    fn test_killed_object() {
        let packet = decode_at("N0CALL>APRS:;LEADER   _092345z4903.50N/07201.75W>", now()).unwrap();
        assert_eq!(packet.get("alive"), Some(&json!(false)));
    }

    #[test]
    fn test_mic_e() {
        let packet = decode_at("N0CALL>S32U6T:`(_fn\"Oj/]comment", now()).unwrap();
        assert_eq!(packet.format(), Some("mic-e"));
        assert_eq!(packet.get("latitude"), Some(&json!(33.427333)));
    }

    #[test]
    fn test_positionless_weather() {
        let packet = decode_at("N0CALL>APRS:_10090556c220s004g005t077r000p000P000h50b09900wRSW", now()).unwrap();

        assert_eq!(packet.format(), Some("wx"));
        assert_eq!(packet.get_str("wx_raw_timestamp"), Some("10090556"));
        assert_eq!(packet.get("weather").unwrap()["temperature"], json!(25.0));
        assert_eq!(packet.get_str("comment"), Some("wRSW"));
    }

    #[test]
    fn test_beacon() {
        let packet = decode_at("N0CALL>BEACON:Club meeting tonight", now()).unwrap();
        assert_eq!(packet.format(), Some("beacon"));
        assert_eq!(packet.get_str("text"), Some("Club meeting tonight"));
    }

    #[test]
    fn test_position_found_inside_body() {
        let packet = decode_at("N0CALL>APRS:TheNet X1J4 !4903.50N/07201.75W-", now()).unwrap();
        assert_eq!(packet.format(), Some("uncompressed"));
    }

    #[test]
    fn test_unsupported_data_type() {
        let result = decode_at("N0CALL>APRS:T#005,199,000,255,073,123,01101001", now());
        match result {
            Err(BridgeError::Decode(msg)) => assert!(msg.contains("unsupported")),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(
            parse_timestamp("150830h", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 15, 8, 30).unwrap().timestamp())
        );
        assert_eq!(parse_timestamp("092345/", now()), None);
        assert_eq!(parse_timestamp("322345z", now()), None, "no 32nd day");
        assert_eq!(parse_timestamp("09x345z", now()), None);
    }
}
