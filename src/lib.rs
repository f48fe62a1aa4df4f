//! # aprs2influxdb Library
//!
//! Connects to APRS-IS and saves the packet stream to InfluxDB.
//!
//! Each feed line is decoded into a field map, translated into one line of
//! InfluxDB line protocol and written over HTTP.

pub mod aprs;
pub mod config;
pub mod error;
pub mod feed;
pub mod influx;
pub mod logging;
pub mod session;
pub mod telemetry;
pub mod translate;
