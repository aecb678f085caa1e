//! Parsers for `REQPOS` and `NAME` replies

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ways a telemetry reply can deviate from the documented format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryParseError {
    #[error("Expected {expected} lines, found {found}")]
    LineCount { expected: usize, found: usize },

    #[error("Line {line}: expected {expected} comma-separated fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected label {expected:?} in {found:?}")]
    Label { expected: &'static str, found: String },

    #[error("Empty value for {label}")]
    EmptyValue { label: &'static str },

    #[error("Invalid number for {label}: {value:?}")]
    InvalidNumber { label: &'static str, value: String },
}

/// Telescope position as reported by `REQPOS`.
///
/// Sexagesimal fields are kept as the TCS formats them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelescopePosition {
    pub utc: String,
    pub lst: String,
    pub ra: String,
    pub dec: String,
    pub ha: String,
    pub airmass: f64,
}

/// One telemetry snapshot: position plus the current target name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub position: TelescopePosition,
    pub target_name: String,
}

impl Telemetry {
    /// Flat key/value view for image headers and logs.
    pub fn header_keys(&self) -> BTreeMap<&'static str, String> {
        let p = &self.position;
        BTreeMap::from([
            ("name", self.target_name.clone()),
            ("UTC", p.utc.clone()),
            ("LST", p.lst.clone()),
            ("RA", p.ra.clone()),
            ("DEC", p.dec.clone()),
            ("HA", p.ha.clone()),
            ("airmass", p.airmass.to_string()),
        ])
    }
}

/// Parse the three-line `REQPOS` reply.
pub fn parse_position_reply(reply: &str) -> Result<TelescopePosition, TelemetryParseError> {
    let lines = reply_lines(reply);
    if lines.len() != 3 {
        return Err(TelemetryParseError::LineCount {
            expected: 3,
            found: lines.len(),
        });
    }

    let time = split_fields(lines[0], 1, 2)?;
    let coords = split_fields(lines[1], 2, 3)?;

    let airmass_text = labeled_value(lines[2], "air mass")?;
    let airmass = airmass_text
        .parse::<f64>()
        .map_err(|_| TelemetryParseError::InvalidNumber {
            label: "air mass",
            value: airmass_text.to_string(),
        })?;

    Ok(TelescopePosition {
        utc: labeled_value(time[0], "UTC")?.to_string(),
        lst: labeled_value(time[1], "LST")?.to_string(),
        ra: labeled_value(coords[0], "RA")?.to_string(),
        dec: labeled_value(coords[1], "DEC")?.to_string(),
        ha: labeled_value(coords[2], "HA")?.to_string(),
        airmass,
    })
}

/// Parse the one-line `NAME` reply.
pub fn parse_name_reply(reply: &str) -> Result<String, TelemetryParseError> {
    let lines = reply_lines(reply);
    if lines.len() != 1 {
        return Err(TelemetryParseError::LineCount {
            expected: 1,
            found: lines.len(),
        });
    }
    Ok(labeled_value(lines[0], "NAME")?.to_string())
}

/// Split into lines, dropping line terminators and one trailing newline.
fn reply_lines(reply: &str) -> Vec<&str> {
    let body = reply.strip_suffix('\n').unwrap_or(reply);
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n').map(|l| l.trim_end_matches('\r')).collect()
}

fn split_fields(line: &str, line_no: usize, expected: usize) -> Result<Vec<&str>, TelemetryParseError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != expected {
        return Err(TelemetryParseError::FieldCount {
            line: line_no,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

/// Extract `value` from `label = value`.
fn labeled_value<'a>(field: &'a str, label: &'static str) -> Result<&'a str, TelemetryParseError> {
    let label_err = || TelemetryParseError::Label {
        expected: label,
        found: field.trim().to_string(),
    };

    let rest = field.trim_start().strip_prefix(label).ok_or_else(label_err)?;
    let value = rest.trim_start().strip_prefix('=').ok_or_else(label_err)?.trim();
    if value.is_empty() {
        return Err(TelemetryParseError::EmptyValue { label });
    }
    Ok(value)
}
