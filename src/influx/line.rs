//! InfluxDB line protocol builder.
//!
//! Line format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2="text"
//! ```
//!
//! No timestamp is written; the server stamps each point on arrival.
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use std::fmt;

/// A value that can be stored in a line protocol field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Numeric text, written bare (e.g. `40.0`, `-105`, `0`)
    Number(String),
    /// Text, written quoted and escaped
    Text(String),
}

impl FieldValue {
    /// Numeric field from a computed float
    ///
    /// Returns `None` for NaN and infinities, which line protocol cannot
    /// represent.
    pub fn float(value: f64) -> Option<Self> {
        value.is_finite().then(|| FieldValue::Number(value.to_string()))
    }

    /// Format this value for line protocol.
    ///
    /// - Number: written as-is (e.g., `3.14`)
    /// - Text: non-printable characters replaced, `\`, `'` and `"` escaped,
    ///   then double-quoted (e.g., `"say \"hi\""`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Number(v) => v.clone(),
            FieldValue::Text(v) => format!("\"{}\"", escape_text(v)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

/// Builds a single line protocol point.
///
/// Tags and fields keep insertion order. The first write of a key wins;
/// later writes of the same key are ignored.
#[derive(Debug, Clone)]
pub struct LineBuilder {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
}

impl LineBuilder {
    /// Create a builder for a measurement.
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a tag. Empty values are skipped, as line protocol forbids them.
    ///
    /// Returns `true` if the tag was added.
    pub fn tag(&mut self, key: &str, value: &str) -> bool {
        if value.is_empty() || self.tags.iter().any(|(k, _)| k == key) {
            return false;
        }
        self.tags.push((key.to_string(), value.to_string()));
        true
    }

    /// Add a field.
    ///
    /// Returns `true` if the field was added, `false` if the key was already
    /// present.
    pub fn field(&mut self, key: &str, value: FieldValue) -> bool {
        if self.has_field(key) {
            return false;
        }
        self.fields.push((key.to_string(), value));
        true
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Number of fields added so far.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Render the line.
    ///
    /// Returns `None` if no fields were added, since a point requires at
    /// least one field.
    pub fn build(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        // Space separator before fields
        line.push(' ');

        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        Some(line)
    }
}

/// Escape measurement name.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Escape tag keys, tag values and field keys.
/// Backslashes go first, then commas, equals signs, and spaces.
pub fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Escape free text for a quoted string field.
///
/// Anything outside printable ASCII becomes `?`, then backslashes, single
/// quotes and double quotes are backslash-escaped.
pub fn escape_text(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '\'' | '"' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}
