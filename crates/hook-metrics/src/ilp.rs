//! Influx line protocol formatting.
//!
//! `table,tag=v,tag=v field=v,field=v ts_ns` — tags and field keys need
//! commas, spaces and equals escaped; string field values are quoted.

use std::fmt::Write;

/// A typed field value. Integers carry the `i` suffix the protocol
/// requires to keep the column integral.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

fn escape_key(s: &str) -> String {
    s.replace('\\', r"\\")
        .replace(',', r"\,")
        .replace(' ', r"\ ")
        .replace('=', r"\=")
}

fn escape_string_value(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', "\\\"")
}

/// Format one line-protocol record. Returns `None` when there are no
/// fields (a record without fields is invalid in the protocol).
pub fn to_ilp(
    table: &str,
    tags: &[(&str, &str)],
    fields: &[(&str, FieldValue)],
    ts_ns: i64,
) -> Option<String> {
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_key(table);
    for (key, value) in tags {
        if value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
    }

    line.push(' ');
    let mut first = true;
    for (key, value) in fields {
        if !first {
            line.push(',');
        }
        first = false;
        let _ = write!(line, "{}=", escape_key(key));
        match value {
            FieldValue::Float(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Int(v) => {
                let _ = write!(line, "{v}i");
            }
            FieldValue::Bool(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Str(v) => {
                let _ = write!(line, "\"{}\"", escape_string_value(v));
            }
        }
    }

    let _ = write!(line, " {ts_ns}");
    Some(line)
}

/// Current wall-clock time in nanoseconds for record timestamps.
pub fn now_ns() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
}
