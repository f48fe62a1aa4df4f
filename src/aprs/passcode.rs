//! # APRS-IS Passcode
//!
//! The 15-bit hash APRS-IS servers use to verify a login callsign.
//!
//! The SSID (`-9`, `-15`, ...) is not part of the hash, and the callsign is
//! hashed upper-case, two characters at a time.

/// Initial hash value
const PASSCODE_SEED: u16 = 0x73E2;

/// Passcodes are 15-bit
const PASSCODE_MASK: u16 = 0x7FFF;

/// Compute the APRS-IS passcode for a callsign
///
/// # Arguments
///
/// * `callsign` - Login callsign, with or without SSID
///
/// # Returns
///
/// * `u16` - Passcode in the range 0..=32767
///
/// # Examples
///
/// ```
/// use aprs2influxdb::aprs::passcode::passcode;
///
/// assert_eq!(passcode("N0CALL"), 13023);
/// assert_eq!(passcode("n0call-9"), 13023);
/// ```
pub fn passcode(callsign: &str) -> u16 {
    let base = callsign
        .split('-')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    let mut hash = PASSCODE_SEED;
    for pair in base.as_bytes().chunks(2) {
        hash ^= (pair[0] as u16) << 8;
        if let Some(&low) = pair.get(1) {
            hash ^= low as u16;
        }
    }

    hash & PASSCODE_MASK
}
