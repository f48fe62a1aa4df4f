//! # Position Report Decoding
//!
//! Uncompressed (`4903.50N/07201.75W-`), compressed (`/5L!!<*e7>7P[`) and
//! Mic-E position formats, plus the comment extensions that ride along with
//! them (course/speed, PHG, RNG, altitude, base91 telemetry).
//!
//! Speeds are reported in km/h and altitudes in metres.

use serde_json::{json, Value};

use super::protocol::{DecodedPacket, TELEMETRY_CHANNELS};
use super::weather::parse_weather;
use crate::error::{BridgeError, Result};

/// knots → km/h
const KNOTS_TO_KMH: f64 = 1.852;

/// feet → metres
const FEET_TO_METRES: f64 = 0.3048;

/// Length of `DDMM.mmN/DDDMM.mmW$`
const UNCOMPRESSED_LEN: usize = 19;

/// Length of `TYYYYXXXX$csT`
const COMPRESSED_LEN: usize = 13;

/// Mic-E body: lon(3) + speed/course(3) + symbol + table
const MIC_E_MIN_LEN: usize = 8;

/// Which position encoding a report used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Uncompressed,
    Compressed,
}

impl PositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionKind::Uncompressed => "uncompressed",
            PositionKind::Compressed => "compressed",
        }
    }
}

/// Decode a position (uncompressed or compressed) and its comment
///
/// Fills position, symbol, weather and comment fields into `packet`.
///
/// # Errors
///
/// Returns a decode error if the body is neither a valid uncompressed nor
/// a valid compressed position.
pub fn parse_position(packet: &mut DecodedPacket, body: &str) -> Result<PositionKind> {
    let first = body
        .chars()
        .next()
        .ok_or_else(|| BridgeError::Decode("empty position".to_string()))?;

    let (kind, symbol, comment) = if first.is_ascii_digit() || first == ' ' {
        let symbol = parse_uncompressed(packet, body)?;
        (PositionKind::Uncompressed, symbol, &body[UNCOMPRESSED_LEN..])
    } else if is_symbol_table(first) {
        let symbol = parse_compressed(packet, body)?;
        (PositionKind::Compressed, symbol, &body[COMPRESSED_LEN..])
    } else {
        return Err(BridgeError::Decode(format!(
            "unrecognised position start {:?}",
            first
        )));
    };

    if symbol == '_' {
        let (weather, rest) = parse_weather(comment, true);
        if !weather.is_empty() {
            packet.insert("weather", Value::Object(weather));
        }
        parse_comment(packet, rest, kind == PositionKind::Uncompressed);
    } else {
        parse_comment(packet, comment, kind == PositionKind::Uncompressed);
    }

    Ok(kind)
}

/// Symbol table identifiers: primary, alternate, or overlay
fn is_symbol_table(c: char) -> bool {
    c == '/' || c == '\\' || c.is_ascii_uppercase() || ('a'..='j').contains(&c)
}

/// Returns the symbol code
fn parse_uncompressed(packet: &mut DecodedPacket, body: &str) -> Result<char> {
    let position = body
        .get(..UNCOMPRESSED_LEN)
        .filter(|p| p.is_ascii())
        .ok_or_else(|| BridgeError::Decode("uncompressed position too short".to_string()))?;
    let bytes = position.as_bytes();

    let lat_text = &position[0..7];
    let lat_hemisphere = bytes[7] as char;
    let table = bytes[8] as char;
    let lon_text = &position[9..17];
    let lon_hemisphere = bytes[17] as char;
    let symbol = bytes[18] as char;

    // Spaces replace trailing digits to blur the position
    let ambiguity = lat_text[2..].chars().filter(|c| *c == ' ').count();
    if ambiguity > 4 {
        return Err(BridgeError::Decode("invalid position ambiguity".to_string()));
    }

    let mut latitude = parse_degrees_minutes(lat_text, 2)?;
    let mut longitude = parse_degrees_minutes(lon_text, 3)?;

    match lat_hemisphere {
        'N' | 'n' => {}
        'S' | 's' => latitude = -latitude,
        other => return Err(BridgeError::Decode(format!("bad latitude hemisphere {:?}", other))),
    }
    match lon_hemisphere {
        'E' | 'e' => {}
        'W' | 'w' => longitude = -longitude,
        other => return Err(BridgeError::Decode(format!("bad longitude hemisphere {:?}", other))),
    }

    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return Err(BridgeError::Decode("position out of range".to_string()));
    }

    packet.insert("latitude", round6(latitude));
    packet.insert("longitude", round6(longitude));
    packet.insert("posambiguity", ambiguity as u64);
    packet.insert("symbol_table", table.to_string());
    packet.insert("symbol", symbol.to_string());

    Ok(symbol)
}

/// Parse `DDMM.mm` / `DDDMM.mm` into decimal degrees
fn parse_degrees_minutes(text: &str, degree_digits: usize) -> Result<f64> {
    let cleaned = text.replace(' ', "0");
    let degrees: f64 = cleaned[..degree_digits]
        .parse()
        .map_err(|_| BridgeError::Decode(format!("bad degrees in {:?}", text)))?;
    let minutes: f64 = cleaned[degree_digits..]
        .parse()
        .map_err(|_| BridgeError::Decode(format!("bad minutes in {:?}", text)))?;

    if minutes >= 60.0 {
        return Err(BridgeError::Decode(format!("minutes out of range in {:?}", text)));
    }

    Ok(degrees + minutes / 60.0)
}

/// Returns the symbol code
fn parse_compressed(packet: &mut DecodedPacket, body: &str) -> Result<char> {
    let position = body
        .get(..COMPRESSED_LEN)
        .filter(|p| p.is_ascii())
        .ok_or_else(|| BridgeError::Decode("compressed position too short".to_string()))?;
    let bytes = position.as_bytes();

    let table = bytes[0] as char;
    let lat_raw = base91(&position[1..5])
        .ok_or_else(|| BridgeError::Decode("bad compressed latitude".to_string()))?;
    let lon_raw = base91(&position[5..9])
        .ok_or_else(|| BridgeError::Decode("bad compressed longitude".to_string()))?;
    let symbol = bytes[9] as char;
    let c = bytes[10];
    let s = bytes[11];
    let t = bytes[12];

    let latitude = 90.0 - lat_raw as f64 / 380_926.0;
    let longitude = -180.0 + lon_raw as f64 / 190_463.0;

    packet.insert("latitude", round6(latitude));
    packet.insert("longitude", round6(longitude));
    packet.insert("symbol_table", table.to_string());
    packet.insert("symbol", symbol.to_string());

    if c != b' ' && t >= 33 {
        let compression_type = t - 33;
        packet.insert("gpsfixstatus", ((compression_type >> 5) & 1) as u64);

        if compression_type & 0x18 == 0x10 && c >= 33 && s >= 33 {
            let cs = (c - 33) as i32 * 91 + (s - 33) as i32;
            let feet = 1.002f64.powi(cs);
            packet.insert("altitude", round2(feet * FEET_TO_METRES));
        } else if (b'!'..=b'z').contains(&c) && s >= 33 {
            packet.insert("course", (c - 33) as u64 * 4);
            let knots = 1.08f64.powi((s - 33) as i32) - 1.0;
            packet.insert("speed", round2(knots * KNOTS_TO_KMH));
        } else if c == b'{' && s >= 33 {
            let miles = 2.0 * 1.08f64.powi((s - 33) as i32);
            packet.insert("rng", format!("{:.2}", miles * 1.609344));
        }
    }

    Ok(symbol)
}

/// Decode a Mic-E report
///
/// # Arguments
///
/// * `destination` - The `to` field, which carries latitude and message bits
/// * `body` - Information field after the `` ` `` / `'` identifier
pub fn parse_mic_e(packet: &mut DecodedPacket, destination: &str, body: &str) -> Result<()> {
    let dest = destination.as_bytes();
    if dest.len() < 6 {
        return Err(BridgeError::Decode(format!("mic-e destination too short: {}", destination)));
    }
    let info = body
        .get(..MIC_E_MIN_LEN)
        .ok_or_else(|| BridgeError::Decode("mic-e body too short".to_string()))?
        .as_bytes();

    let mut digits = [0u32; 6];
    let mut ambiguity = 0;
    for (i, &b) in dest[..6].iter().enumerate() {
        digits[i] = match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'A'..=b'J' => (b - b'A') as u32,
            b'P'..=b'Y' => (b - b'P') as u32,
            b'K' | b'L' | b'Z' => {
                ambiguity += 1;
                0
            }
            _ => {
                return Err(BridgeError::Decode(format!(
                    "invalid mic-e destination {}",
                    destination
                )))
            }
        };
    }

    let north = (b'P'..=b'Z').contains(&dest[3]);
    let lon_offset = (b'P'..=b'Z').contains(&dest[4]);
    let west = (b'P'..=b'Z').contains(&dest[5]);

    let minutes = (digits[2] * 10 + digits[3]) as f64 + (digits[4] * 10 + digits[5]) as f64 / 100.0;
    let mut latitude = (digits[0] * 10 + digits[1]) as f64 + minutes / 60.0;
    if !north {
        latitude = -latitude;
    }

    if info[..6].iter().any(|&b| b < 28) {
        return Err(BridgeError::Decode("mic-e body out of range".to_string()));
    }

    let mut lon_degrees = (info[0] - 28) as i32;
    if lon_offset {
        lon_degrees += 100;
    }
    if (180..=189).contains(&lon_degrees) {
        lon_degrees -= 80;
    } else if (190..=199).contains(&lon_degrees) {
        lon_degrees -= 190;
    }
    let mut lon_minutes = (info[1] - 28) as i32;
    if lon_minutes >= 60 {
        lon_minutes -= 60;
    }
    let lon_hundredths = (info[2] - 28) as i32;
    let mut longitude =
        lon_degrees as f64 + (lon_minutes as f64 + lon_hundredths as f64 / 100.0) / 60.0;
    if west {
        longitude = -longitude;
    }

    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return Err(BridgeError::Decode("mic-e position out of range".to_string()));
    }

    let sp = (info[3] - 28) as i32;
    let dc = (info[4] - 28) as i32;
    let se = (info[5] - 28) as i32;
    let mut speed = sp * 10 + dc / 10;
    let mut course = (dc % 10) * 100 + se;
    if speed >= 800 {
        speed -= 800;
    }
    if course >= 400 {
        course -= 400;
    }

    let mbits: String = dest[..3]
        .iter()
        .map(|&b| if (b'P'..=b'Z').contains(&b) || (b'A'..=b'K').contains(&b) { '1' } else { '0' })
        .collect();
    let custom = dest[..3].iter().any(|b| (b'A'..=b'K').contains(b));

    packet.insert("latitude", round6(latitude));
    packet.insert("longitude", round6(longitude));
    packet.insert("posambiguity", ambiguity as u64);
    packet.insert("speed", round2(speed as f64 * KNOTS_TO_KMH));
    packet.insert("course", course as u64);
    packet.insert("symbol", (info[6] as char).to_string());
    packet.insert("symbol_table", (info[7] as char).to_string());
    packet.insert("mbits", mbits.clone());
    packet.insert("mtype", mic_e_message_type(&mbits, custom));

    let mut comment = &body[MIC_E_MIN_LEN..];

    // Optional base91 altitude `xxx}` right after the symbol or a type byte
    for start in 0..=1 {
        if comment.get(start + 3..start + 4) == Some("}") {
            if let Some(value) = comment.get(start..start + 3).and_then(base91) {
                packet.insert("altitude", value as f64 - 10_000.0);
                comment = &comment[start + 4..];
                break;
            }
        }
    }

    parse_comment(packet, comment, false);

    Ok(())
}

fn mic_e_message_type(mbits: &str, custom: bool) -> String {
    let name = match mbits {
        "111" => "Off Duty",
        "110" => "En Route",
        "101" => "In Service",
        "100" => "Returning",
        "011" => "Committed",
        "010" => "Special",
        "001" => "Priority",
        _ => "Emergency",
    };
    if custom && mbits != "000" {
        format!("Custom-{}", name)
    } else {
        name.to_string()
    }
}

/// Parse position comment extensions and store the remaining text
///
/// `data_extension` enables the leading `CCC/SSS`, `PHGphgd`, `RNGrrrr`
/// extensions, which only follow uncompressed positions.
pub fn parse_comment(packet: &mut DecodedPacket, comment: &str, data_extension: bool) {
    let mut text = comment.to_string();

    if data_extension {
        if let Some(ext) = text.get(..7).map(str::to_string) {
            let bytes = ext.as_bytes();
            if bytes[3] == b'/' && ext[..3].chars().all(|c| c.is_ascii_digit()) {
                if let (Ok(course), Ok(speed)) = (ext[..3].parse::<u64>(), ext[4..].parse::<u64>()) {
                    if course <= 360 {
                        packet.insert("course", course);
                    }
                    packet.insert("speed", round2(speed as f64 * KNOTS_TO_KMH));
                    text.drain(..7);
                }
            } else if let Some(phg) = ext.strip_prefix("PHG") {
                packet.insert("phg", phg.to_string());
                text.drain(..7);
            } else if let Some(rng) = ext.strip_prefix("RNG") {
                if rng.chars().all(|c| c.is_ascii_digit()) {
                    packet.insert("rng", rng.to_string());
                    text.drain(..7);
                }
            }
        }
    }

    if let Some(index) = text.find("/A=") {
        if let Some(feet) = text
            .get(index + 3..index + 9)
            .and_then(|v| v.parse::<i64>().ok())
        {
            packet.insert("altitude", round2(feet as f64 * FEET_TO_METRES));
            text.replace_range(index..index + 9, "");
        }
    }

    if let Some((telemetry, start, end)) = find_comment_telemetry(&text) {
        packet.insert("telemetry", telemetry);
        text.replace_range(start..end, "");
    }

    let trimmed = text.trim();
    if !trimmed.is_empty() {
        packet.insert("comment", trimmed.to_string());
    }
}

/// Find `|ssaabbccddeeff|` base91 telemetry in a comment
///
/// Returns the telemetry mapping and the byte range it occupied.
fn find_comment_telemetry(text: &str) -> Option<(Value, usize, usize)> {
    let start = text.find('|')?;
    let len = text[start + 1..].find('|')?;
    let end = start + 1 + len + 1;
    let inner = &text[start + 1..start + 1 + len];

    if !(4..=16).contains(&inner.len()) || inner.len() % 2 != 0 {
        return None;
    }

    let mut pairs = Vec::with_capacity(inner.len() / 2);
    for i in (0..inner.len()).step_by(2) {
        pairs.push(base91(inner.get(i..i + 2)?)?);
    }

    let seq = pairs[0];
    let vals: Vec<u32> = pairs[1..].iter().copied().take(TELEMETRY_CHANNELS).collect();
    let mut telemetry = json!({ "seq": seq, "vals": vals });
    if let Some(&bits) = pairs.get(TELEMETRY_CHANNELS + 1) {
        telemetry["bits"] = json!(bits);
    }

    Some((telemetry, start, end))
}

/// Decode a base91 number (`!` = 0 ... `{` = 90)
pub fn base91(text: &str) -> Option<u32> {
    text.bytes().try_fold(0u32, |acc, b| {
        if (b'!'..=b'{').contains(&b) {
            Some(acc * 91 + (b - 33) as u32)
        } else {
            None
        }
    })
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
