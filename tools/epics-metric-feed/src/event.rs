// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parsing of tab-separated metric event lines.
//!
//! ```text
//! name<TAB>type<TAB>value[<TAB>unit]
//! ```
//!
//! `type` is one of `string`, `int`, `double`, `float`, `unsigned`.

use epics_metric::MetricValue;
use thiserror::Error;

/// One metric event read from input.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub name: String,
    pub value: MetricValue,
    pub unit: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected name<TAB>type<TAB>value[<TAB>unit], got {0} field(s)")]
    FieldCount(usize),

    #[error("unknown metric type \"{0}\"")]
    UnknownType(String),

    #[error("invalid {kind} value \"{value}\"")]
    InvalidValue { kind: &'static str, value: String },
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<MetricEvent>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    let (name, kind, raw, unit) = match fields.as_slice() {
        [name, kind, raw] => (*name, *kind, *raw, ""),
        [name, kind, raw, unit] => (*name, *kind, *raw, *unit),
        other => return Err(ParseError::FieldCount(other.len())),
    };

    let value = match kind.trim() {
        "string" | "str" => MetricValue::String(raw.to_string()),
        "int" => MetricValue::Int(parse_number(raw, "int")?),
        "unsigned" | "uint" => MetricValue::Unsigned(parse_number(raw, "unsigned")?),
        "double" => MetricValue::Double(parse_number(raw, "double")?),
        "float" => MetricValue::Float(parse_number(raw, "float")?),
        other => return Err(ParseError::UnknownType(other.to_string())),
    };

    Ok(Some(MetricEvent {
        name: name.to_string(),
        value,
        unit: unit.to_string(),
    }))
}

fn parse_number<T: std::str::FromStr>(raw: &str, kind: &'static str) -> Result<T, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidValue {
        kind,
        value: raw.to_string(),
    })
}
