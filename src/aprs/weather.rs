//! # Weather Report Decoding
//!
//! Parses the `cDDDsSSSgGGGtTTT...` weather element list used by
//! positionless weather reports and by position reports with the `_`
//! (weather station) symbol.
//!
//! Values are converted to metric units: wind in m/s, temperature in °C,
//! rain in mm, pressure in hPa.

use serde_json::{Map, Value};

/// mph → m/s
const MPH_TO_MS: f64 = 0.44704;

/// hundredths of an inch → mm
const HUNDREDTHS_INCH_TO_MM: f64 = 0.254;

/// Width of the value following each element key
fn element_width(key: char) -> Option<usize> {
    match key {
        'c' | 's' | 'g' | 't' | 'r' | 'p' | 'P' | 'L' | 'l' | '#' => Some(3),
        'h' => Some(2),
        'b' => Some(5),
        _ => None,
    }
}

/// Parse a weather element list
///
/// # Arguments
///
/// * `text` - Weather data, starting at the first element
/// * `leading_wind` - Whether `text` starts with the positional `DDD/SSS`
///   wind direction/speed form used after a position
///
/// # Returns
///
/// * `(Map, &str)` - Decoded weather values and the unparsed remainder
pub fn parse_weather(text: &str, leading_wind: bool) -> (Map<String, Value>, &str) {
    let mut weather = Map::new();
    let mut rest = text;

    if leading_wind && rest.get(3..4) == Some("/") {
        if let (Some(dir), Some(speed)) = (rest.get(0..3), rest.get(4..7)) {
            insert_element(&mut weather, 'c', dir);
            insert_element(&mut weather, 's', speed);
            rest = &rest[7..];
        }
    }

    while let Some(key) = rest.chars().next() {
        let Some(width) = element_width(key) else { break };
        let Some(value) = rest.get(1..1 + width) else { break };
        if !value
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ' ' || c == '-')
        {
            break;
        }
        insert_element(&mut weather, key, value);
        rest = &rest[1 + width..];
    }

    (weather, rest)
}

/// Convert and store a single element; missing readings (`...`) are skipped
fn insert_element(weather: &mut Map<String, Value>, key: char, raw: &str) {
    let Ok(value) = raw.trim().parse::<i32>() else {
        return;
    };
    let value = value as f64;

    let (name, converted) = match key {
        'c' => ("wind_direction", value),
        's' => ("wind_speed", round2(value * MPH_TO_MS)),
        'g' => ("wind_gust", round2(value * MPH_TO_MS)),
        't' => ("temperature", round2((value - 32.0) / 1.8)),
        'r' => ("rain_1h", round2(value * HUNDREDTHS_INCH_TO_MM)),
        'p' => ("rain_24h", round2(value * HUNDREDTHS_INCH_TO_MM)),
        'P' => ("rain_since_midnight", round2(value * HUNDREDTHS_INCH_TO_MM)),
        'h' => ("humidity", if value == 0.0 { 100.0 } else { value }),
        'b' => ("pressure", round2(value / 10.0)),
        'L' => ("luminosity", value),
        'l' => ("luminosity", value + 1000.0),
        _ => return,
    };

    weather.insert(name.to_string(), Value::from(converted));
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positionless_elements() {
        let (weather, rest) = parse_weather("c220s004g005t077r000p000P000h50b09900wRSW", false);

        assert_eq!(weather.get("wind_direction"), Some(&json!(220.0)));
        assert_eq!(weather.get("wind_speed"), Some(&json!(1.79)));
        assert_eq!(weather.get("wind_gust"), Some(&json!(2.24)));
        assert_eq!(weather.get("temperature"), Some(&json!(25.0)));
        assert_eq!(weather.get("rain_1h"), Some(&json!(0.0)));
        assert_eq!(weather.get("humidity"), Some(&json!(50.0)));
        assert_eq!(weather.get("pressure"), Some(&json!(990.0)));
        assert_eq!(rest, "wRSW");
    }

    #[test]
    fn test_leading_wind_after_position() {
        let (weather, rest) = parse_weather("090/000g000t066 comment", true);

        assert_eq!(weather.get("wind_direction"), Some(&json!(90.0)));
        assert_eq!(weather.get("wind_speed"), Some(&json!(0.0)));
        assert_eq!(weather.get("temperature"), Some(&json!(18.89)));
        assert_eq!(rest, " comment");
    }

    #[test]
    fn test_missing_readings_skipped() {
        let (weather, _) = parse_weather("c...s...t-05h00", false);

        assert!(weather.get("wind_direction").is_none());
        assert!(weather.get("wind_speed").is_none());
        assert_eq!(weather.get("temperature"), Some(&json!(-20.56)));
        assert_eq!(weather.get("humidity"), Some(&json!(100.0)), "h00 means 100%");
    }

    #[test]
    fn test_stops_at_unknown_element() {
        let (weather, rest) = parse_weather("t050Xyz", false);
        assert_eq!(weather.len(), 1);
        assert_eq!(rest, "Xyz");
    }

    #[test]
    fn test_truncated_element() {
        let (weather, rest) = parse_weather("t05", false);
        assert!(weather.is_empty());
        assert_eq!(rest, "t05");
    }
}
