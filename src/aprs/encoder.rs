//! # APRS-IS Line Encoder
//!
//! Builds the lines the bridge sends to the APRS-IS server: the login line
//! and the periodic heartbeat status.

use super::protocol::SOFTWARE_NAME;

/// Line terminator required by APRS-IS
pub const LINE_TERMINATOR: &str = "\r\n";

/// Encode the login line
///
/// # Arguments
///
/// * `callsign` - Login callsign
/// * `passcode` - Passcode, or `-1` for receive-only
/// * `filter` - Optional server-side filter expression
///
/// # Returns
///
/// * `String` - `user CALL pass CODE vers aprs2influxdb VERSION[ filter F]\r\n`
///
/// # Examples
///
/// ```
/// use aprs2influxdb::aprs::encoder::encode_login;
///
/// let line = encode_login("N0CALL", -1, None);
/// assert!(line.starts_with("user N0CALL pass -1 vers aprs2influxdb "));
/// assert!(line.ends_with("\r\n"));
/// ```
pub fn encode_login(callsign: &str, passcode: i32, filter: Option<&str>) -> String {
    let mut line = format!(
        "user {} pass {} vers {} {}",
        callsign,
        passcode,
        SOFTWARE_NAME,
        env!("CARGO_PKG_VERSION")
    );

    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        line.push_str(" filter ");
        line.push_str(filter);
    }

    line.push_str(LINE_TERMINATOR);
    line
}

/// Encode a heartbeat status packet
///
/// Keeps the server from dropping an otherwise silent connection.
///
/// # Arguments
///
/// * `callsign` - Login callsign, used as the source
/// * `timestamp` - Unix time in seconds
pub fn encode_heartbeat(callsign: &str, timestamp: i64) -> String {
    format!(
        "{}>APRS,TCPIP*:>{} heartbeat {}{}",
        callsign, SOFTWARE_NAME, timestamp, LINE_TERMINATOR
    )
}
