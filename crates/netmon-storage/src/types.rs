//! Tagged wire values, native values and record types.
//!
//! The store describes every attribute with a single type tag wrapping its
//! payload, e.g. `{"S": "router1"}` or `{"M": {"port": {"N": "22"}}}`.
//! [`AttributeValue`] is the closed set of those tags; [`Value`] is the
//! plain structure handed to clients.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::DecodeError;

/// A record exactly as returned by the store: attribute name to tagged JSON.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A decoded device record: attribute name to native value.
pub type DeviceRecord = BTreeMap<String, Value>;

// =============================================================================
// Numbers
// =============================================================================

/// A numeric attribute.
///
/// The store transmits numbers as decimal strings of up to 38 significant
/// digits. The text is kept (normalized to JSON number syntax) and written
/// out verbatim, so no digit is lost on the way to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(String);

impl Number {
    /// Parses a decimal number string.
    ///
    /// Leading `+`, redundant leading zeros, a bare leading or trailing `.`
    /// and upper-case exponents are normalized away.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::MalformedValue` if the text is not a finite
    /// decimal number.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let malformed = || DecodeError::malformed("N", format!("'{text}' is not a finite number"));
        let normalized = normalize_decimal(text.trim()).ok_or_else(malformed)?;
        match normalized.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(Self(normalized)),
            _ => Err(malformed()),
        }
    }

    /// Returns the number's decimal text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number as an `i64` if it is an integer in range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Returns the number as an `f64` (may lose precision).
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0.parse().unwrap_or(f64::NAN)
    }
}

/// Rewrites `[+-]digits[.digits][(e|E)[+-]digits]` into JSON number syntax.
fn normalize_decimal(text: &str) -> Option<String> {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return None;
    }

    let int = int.trim_start_matches('0');
    let mut out = format!("{sign}{}", if int.is_empty() { "0" } else { int });
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if digits.is_empty() || !all_digits(digits) {
            return None;
        }
        out.push('e');
        out.push_str(exp);
    }
    Some(out)
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Emitted as a raw JSON token: the text is exact, an f64 is not.
        let raw = RawValue::from_string(self.0.clone()).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }
}

// =============================================================================
// Tagged wire values
// =============================================================================

/// A single self-describing attribute value as transmitted by the store.
///
/// Payloads are validated when parsed (numbers are checked, binary is
/// base64-decoded), so converting to a [`Value`] cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// `S`: string.
    S(String),
    /// `N`: number.
    N(Number),
    /// `BOOL`: boolean.
    Bool(bool),
    /// `NULL`: explicit null.
    Null,
    /// `B`: binary.
    B(Vec<u8>),
    /// `SS`: set of strings.
    Ss(Vec<String>),
    /// `NS`: set of numbers.
    Ns(Vec<Number>),
    /// `BS`: set of binaries.
    Bs(Vec<Vec<u8>>),
    /// `L`: list of tagged values.
    L(Vec<AttributeValue>),
    /// `M`: map of names to tagged values.
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Every type tag understood by the decoder.
    pub const TAGS: [&'static str; 10] = ["S", "N", "BOOL", "NULL", "B", "SS", "NS", "BS", "L", "M"];

    /// Returns the wire tag of this value.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

// =============================================================================
// Native values
// =============================================================================

/// A decoded attribute value with no type tags.
///
/// Serializes to plain JSON: numbers as JSON numbers, binary as base64
/// strings, sets and lists as arrays, maps as objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    Binary(Vec<u8>),
    StringSet(Vec<String>),
    NumberSet(Vec<Number>),
    BinarySet(Vec<Vec<u8>>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

struct Base64Bytes<'a>(&'a [u8]);

impl Serialize for Base64Bytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => n.serialize(serializer),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Null => serializer.serialize_unit(),
            Self::Binary(bytes) => Base64Bytes(bytes).serialize(serializer),
            Self::StringSet(items) => items.serialize(serializer),
            Self::NumberSet(items) => items.serialize(serializer),
            Self::BinarySet(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Base64Bytes(item))?;
                }
                seq.end()
            }
            Self::List(items) => items.serialize(serializer),
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
