//! # APRS Module
//!
//! APRS-IS protocol support for the bridge.
//!
//! This module handles:
//! - Decoding TNC2 feed lines into field maps
//! - Encoding login and heartbeat lines
//! - Computing login passcodes

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod passcode;
pub mod position;
pub mod weather;
