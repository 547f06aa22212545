// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoding of metric values into Channel Access `DBR_*` field types.
//!
//! Channel Access has no unit metadata on a put and no wide unsigned type,
//! so two conversions lose information on purpose:
//! ```text
//! string   value + " " + unit, cut to 40 bytes     -> DBR_STRING
//! int      as-is                                   -> DBR_LONG
//! double   as-is                                   -> DBR_DOUBLE
//! float    as-is                                   -> DBR_FLOAT
//! unsigned value mod 2^32, bit pattern kept        -> DBR_LONG
//! ```

use std::fmt;

/// Width of the `DBR_STRING` field in bytes.
pub const MAX_STRING_SIZE: usize = 40;

/// Channel Access field types used by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DbrType {
    /// Fixed 40-byte string.
    String = 0,
    /// 32-bit IEEE float.
    Float = 2,
    /// 32-bit signed integer.
    Long = 5,
    /// 64-bit IEEE float.
    Double = 6,
}

impl DbrType {
    /// Numeric type code on the wire.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Payload size in bytes for one element.
    pub fn size(self) -> usize {
        match self {
            DbrType::String => MAX_STRING_SIZE,
            DbrType::Float | DbrType::Long => 4,
            DbrType::Double => 8,
        }
    }
}

impl fmt::Display for DbrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbrType::String => "DBR_STRING",
            DbrType::Float => "DBR_FLOAT",
            DbrType::Long => "DBR_LONG",
            DbrType::Double => "DBR_DOUBLE",
        };
        f.write_str(name)
    }
}

/// Contents of a `DBR_STRING` field, at most [`MAX_STRING_SIZE`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbrString(Vec<u8>);

impl DbrString {
    /// Build from arbitrary text, keeping only the first 40 bytes.
    ///
    /// The cut is byte-based and may split a multi-byte character.
    pub fn truncated(text: &str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_STRING_SIZE);
        Self(bytes[..len].to_vec())
    }

    /// Raw payload bytes (without padding).
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view, for logging.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// A value ready to be written to a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DbrValue {
    /// `DBR_STRING`
    String(DbrString),
    /// `DBR_LONG`
    Long(i32),
    /// `DBR_FLOAT`
    Float(f32),
    /// `DBR_DOUBLE`
    Double(f64),
}

impl DbrValue {
    /// Field type of this value.
    pub fn dbr_type(&self) -> DbrType {
        match self {
            DbrValue::String(_) => DbrType::String,
            DbrValue::Long(_) => DbrType::Long,
            DbrValue::Float(_) => DbrType::Float,
            DbrValue::Double(_) => DbrType::Double,
        }
    }

    /// Fixed-width network (big-endian) payload.
    ///
    /// Strings are NUL padded to the full 40 bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            DbrValue::String(s) => {
                let mut out = vec![0u8; MAX_STRING_SIZE];
                out[..s.len()].copy_from_slice(s.as_bytes());
                out
            }
            DbrValue::Long(v) => v.to_be_bytes().to_vec(),
            DbrValue::Float(v) => v.to_be_bytes().to_vec(),
            DbrValue::Double(v) => v.to_be_bytes().to_vec(),
        }
    }
}

impl fmt::Display for DbrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbrValue::String(s) => write!(f, "{}", s.to_string_lossy()),
            DbrValue::Long(v) => write!(f, "{}", v),
            DbrValue::Float(v) => write!(f, "{}", v),
            DbrValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// Encode a string metric. The unit is appended after a space.
pub fn encode_string(value: &str, unit: &str) -> DbrValue {
    let mut text = String::with_capacity(value.len() + 1 + unit.len());
    text.push_str(value);
    text.push(' ');
    text.push_str(unit);
    DbrValue::String(DbrString::truncated(&text))
}

/// Encode a signed integer metric.
pub fn encode_int(value: i32) -> DbrValue {
    DbrValue::Long(value)
}

/// Encode a double metric.
pub fn encode_double(value: f64) -> DbrValue {
    DbrValue::Double(value)
}

/// Encode a float metric.
pub fn encode_float(value: f32) -> DbrValue {
    DbrValue::Float(value)
}

/// Encode an unsigned metric.
///
/// `DBR_LONG` is the widest integer field, so the value is reduced modulo
/// 2^32 and the resulting bit pattern is carried in the signed field.
pub fn encode_unsigned(value: u64) -> DbrValue {
    DbrValue::Long(value as u32 as i32)
}

/// Log at debug level that `unit` will not reach `channel`.
///
/// Numeric puts carry no unit; nothing is logged for an empty unit.
pub fn note_dropped_unit(channel: &str, unit: &str) {
    if !unit.is_empty() {
        log::debug!(
            "unit \"{}\" not transmitted for {}; configure units in the IOC database",
            unit,
            channel
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_string_appends_unit() {
        let v = encode_string("running", "state");
        assert_eq!(v.dbr_type(), DbrType::String);
        match v {
            DbrValue::String(s) => assert_eq!(s.as_bytes(), b"running state"),
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_string_empty_unit_keeps_trailing_space() {
        match encode_string("ok", "") {
            DbrValue::String(s) => assert_eq!(s.as_bytes(), b"ok "),
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_string_truncates_to_40_bytes() {
        let value = "0123456789".repeat(5);
        let full = format!("{} {}", value, "units");

        match encode_string(&value, "units") {
            DbrValue::String(s) => {
                assert_eq!(s.len(), MAX_STRING_SIZE);
                assert_eq!(s.as_bytes(), &full.as_bytes()[..MAX_STRING_SIZE]);
            }
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_string_exactly_40_bytes_untouched() {
        let value = "a".repeat(38);
        match encode_string(&value, "b") {
            DbrValue::String(s) => {
                assert_eq!(s.len(), 40);
                assert!(s.as_bytes().ends_with(b" b"));
            }
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_unsigned_wraps_modulo_2_32() {
        let v = encode_unsigned(5_000_000_000);
        match v {
            DbrValue::Long(x) => assert_eq!(x as u32 as u64, 5_000_000_000 % (1u64 << 32)),
            other => panic!("expected Long, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_unsigned_high_bit_kept_as_pattern() {
        match encode_unsigned(u32::MAX as u64) {
            DbrValue::Long(x) => {
                assert_eq!(x, -1);
                assert_eq!(x as u32, u32::MAX);
            }
            other => panic!("expected Long, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_numeric_types() {
        assert_eq!(encode_int(-7), DbrValue::Long(-7));
        assert_eq!(encode_double(2.5), DbrValue::Double(2.5));
        assert_eq!(encode_float(1.25), DbrValue::Float(1.25));
    }

    #[test]
    fn test_to_wire_widths() {
        assert_eq!(encode_string("x", "").to_wire().len(), 40);
        assert_eq!(DbrValue::Long(1).to_wire(), vec![0, 0, 0, 1]);
        assert_eq!(DbrValue::Float(1.0).to_wire(), 1.0f32.to_be_bytes().to_vec());
        assert_eq!(DbrValue::Double(1.0).to_wire().len(), 8);
    }

    #[test]
    fn test_to_wire_string_padding() {
        let wire = encode_string("ab", "c").to_wire();
        assert_eq!(&wire[..4], b"ab c");
        assert!(wire[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_dbr_type_codes() {
        assert_eq!(DbrType::String.code(), 0);
        assert_eq!(DbrType::Float.code(), 2);
        assert_eq!(DbrType::Long.code(), 5);
        assert_eq!(DbrType::Double.code(), 6);
        assert_eq!(DbrType::Double.size(), 8);
        assert_eq!(DbrType::Long.to_string(), "DBR_LONG");
    }
}
