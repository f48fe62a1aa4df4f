//! # InfluxDB Module
//!
//! Line protocol serialization and HTTP writes to InfluxDB 1.x.

pub mod line;
pub mod writer;

pub use line::{FieldValue, LineBuilder};
pub use writer::{HttpLineWriter, LineWriter};
