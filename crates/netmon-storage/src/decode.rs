//! Typed attribute decoding.
//!
//! Decoding happens in two steps:
//!
//! 1. [`AttributeValue::from_json`] reads the store's tagged JSON and rejects
//!    unknown tags or malformed payloads.
//! 2. [`decode`] maps the closed tag enum onto a native [`Value`].
//!
//! The tag alone decides how a payload is read; no schema is consulted.
//! [`encode`] and [`AttributeValue::to_json`] are the inverses, used to seed
//! stores and to build scan cursors.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value as JsonValue, json};

use crate::error::DecodeError;
use crate::types::{AttributeValue, DeviceRecord, Number, RawRecord, Value};

impl AttributeValue {
    /// Parses a tagged JSON value such as `{"S": "router1"}`.
    ///
    /// # Errors
    ///
    /// - `DecodeError::UnknownTypeTag` for a tag outside [`AttributeValue::TAGS`]
    /// - `DecodeError::MalformedValue` for a payload that does not fit its tag
    /// - `DecodeError::InvalidShape` if the value is not a single-tag object
    pub fn from_json(raw: &JsonValue) -> Result<Self, DecodeError> {
        let object = raw.as_object().ok_or_else(|| {
            DecodeError::invalid_shape(format!("expected a tagged object, got {raw}"))
        })?;

        let mut entries = object.iter();
        let (tag, payload) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(DecodeError::invalid_shape(format!(
                    "expected exactly one type tag, found {}",
                    object.len()
                )));
            }
        };

        match tag.as_str() {
            "S" => Ok(Self::S(expect_str(tag, payload)?.to_string())),
            "N" => Ok(Self::N(Number::parse(expect_str(tag, payload)?)?)),
            "BOOL" => Ok(Self::Bool(expect_bool(tag, payload)?)),
            "NULL" => {
                expect_bool(tag, payload)?;
                Ok(Self::Null)
            }
            "B" => Ok(Self::B(decode_base64(tag, payload)?)),
            "SS" => expect_array(tag, payload)?
                .iter()
                .map(|item| expect_str(tag, item).map(str::to_string))
                .collect::<Result<_, _>>()
                .map(Self::Ss),
            "NS" => expect_array(tag, payload)?
                .iter()
                .map(|item| expect_str(tag, item).and_then(Number::parse))
                .collect::<Result<_, _>>()
                .map(Self::Ns),
            "BS" => expect_array(tag, payload)?
                .iter()
                .map(|item| decode_base64(tag, item))
                .collect::<Result<_, _>>()
                .map(Self::Bs),
            "L" => expect_array(tag, payload)?
                .iter()
                .map(Self::from_json)
                .collect::<Result<_, _>>()
                .map(Self::L),
            "M" => payload
                .as_object()
                .ok_or_else(|| DecodeError::malformed(tag, "expected an object"))?
                .iter()
                .map(|(key, value)| {
                    Self::from_json(value)
                        .map(|parsed| (key.clone(), parsed))
                        .map_err(|e| e.in_attribute(key))
                })
                .collect::<Result<_, _>>()
                .map(Self::M),
            other => Err(DecodeError::unknown_type_tag(other)),
        }
    }

    /// Serializes this value back into the store's tagged JSON.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::S(s) => json!({ "S": s }),
            Self::N(n) => json!({ "N": n.as_str() }),
            Self::Bool(b) => json!({ "BOOL": b }),
            Self::Null => json!({ "NULL": true }),
            Self::B(bytes) => json!({ "B": BASE64.encode(bytes) }),
            Self::Ss(items) => json!({ "SS": items }),
            Self::Ns(items) => {
                json!({ "NS": items.iter().map(Number::as_str).collect::<Vec<_>>() })
            }
            Self::Bs(items) => {
                json!({ "BS": items.iter().map(|b| BASE64.encode(b)).collect::<Vec<_>>() })
            }
            Self::L(items) => json!({ "L": items.iter().map(Self::to_json).collect::<Vec<_>>() }),
            Self::M(entries) => {
                let map: serde_json::Map<String, JsonValue> = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect();
                json!({ "M": map })
            }
        }
    }
}

fn expect_str<'a>(tag: &str, payload: &'a JsonValue) -> Result<&'a str, DecodeError> {
    payload
        .as_str()
        .ok_or_else(|| DecodeError::malformed(tag, format!("expected a string, got {payload}")))
}

fn expect_bool(tag: &str, payload: &JsonValue) -> Result<bool, DecodeError> {
    payload
        .as_bool()
        .ok_or_else(|| DecodeError::malformed(tag, format!("expected a boolean, got {payload}")))
}

fn expect_array<'a>(tag: &str, payload: &'a JsonValue) -> Result<&'a Vec<JsonValue>, DecodeError> {
    payload
        .as_array()
        .ok_or_else(|| DecodeError::malformed(tag, format!("expected an array, got {payload}")))
}

fn decode_base64(tag: &str, payload: &JsonValue) -> Result<Vec<u8>, DecodeError> {
    BASE64
        .decode(expect_str(tag, payload)?)
        .map_err(|e| DecodeError::malformed(tag, format!("invalid base64: {e}")))
}

/// Converts a tagged value into its native form.
#[must_use]
pub fn decode(value: AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(n),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null => Value::Null,
        AttributeValue::B(bytes) => Value::Binary(bytes),
        AttributeValue::Ss(items) => Value::StringSet(items),
        AttributeValue::Ns(items) => Value::NumberSet(items),
        AttributeValue::Bs(items) => Value::BinarySet(items),
        AttributeValue::L(items) => Value::List(items.into_iter().map(decode).collect()),
        AttributeValue::M(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, decode(value)))
                .collect(),
        ),
    }
}

/// Converts a native value back into its tagged form.
#[must_use]
pub fn encode(value: Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::S(s),
        Value::Number(n) => AttributeValue::N(n),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Null => AttributeValue::Null,
        Value::Binary(bytes) => AttributeValue::B(bytes),
        Value::StringSet(items) => AttributeValue::Ss(items),
        Value::NumberSet(items) => AttributeValue::Ns(items),
        Value::BinarySet(items) => AttributeValue::Bs(items),
        Value::List(items) => AttributeValue::L(items.into_iter().map(encode).collect()),
        Value::Map(entries) => AttributeValue::M(
            entries
                .into_iter()
                .map(|(key, value)| (key, encode(value)))
                .collect(),
        ),
    }
}

/// Parses and decodes one tagged JSON value.
///
/// # Errors
///
/// See [`AttributeValue::from_json`].
pub fn decode_json(raw: &JsonValue) -> Result<Value, DecodeError> {
    AttributeValue::from_json(raw).map(decode)
}

/// Decodes every attribute of a raw record.
///
/// Fails on the first bad attribute; no partially decoded record is returned.
///
/// # Errors
///
/// Returns the first attribute's `DecodeError`, wrapped with its name.
pub fn decode_record(raw: &RawRecord) -> Result<DeviceRecord, DecodeError> {
    raw.iter()
        .map(|(name, value)| {
            decode_json(value)
                .map(|decoded| (name.clone(), decoded))
                .map_err(|e| e.in_attribute(name))
        })
        .collect()
}

/// Encodes a native record into the store's raw tagged form.
#[must_use]
pub fn encode_record(record: DeviceRecord) -> RawRecord {
    record
        .into_iter()
        .map(|(name, value)| (name, encode(value).to_json()))
        .collect()
}

/// Builds a record map from `(name, value)` pairs.
pub fn record<I, K>(attributes: I) -> DeviceRecord
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    attributes
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect::<BTreeMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One sample per tag. Adding an `AttributeValue` variant without listing
    /// it here (and in `TAGS`) fails `test_every_tag_is_covered`.
    fn samples() -> Vec<AttributeValue> {
        let mut nested = BTreeMap::new();
        nested.insert("port".to_string(), AttributeValue::N(Number::from(22)));
        vec![
            AttributeValue::S("router1".to_string()),
            AttributeValue::N(Number::parse("1700000000").unwrap()),
            AttributeValue::Bool(true),
            AttributeValue::Null,
            AttributeValue::B(vec![0, 1, 2, 255]),
            AttributeValue::Ss(vec!["eth0".to_string(), "wlan0".to_string()]),
            AttributeValue::Ns(vec![Number::from(21), Number::parse("8.5").unwrap()]),
            AttributeValue::Bs(vec![vec![1, 2], vec![3]]),
            AttributeValue::L(vec![AttributeValue::S("x".to_string()), AttributeValue::Null]),
            AttributeValue::M(nested),
        ]
    }

    #[test]
    fn test_every_tag_is_covered() {
        let samples = samples();
        let mut tags: Vec<&str> = samples.iter().map(AttributeValue::tag).collect();
        tags.sort_unstable();
        tags.dedup();

        let mut expected = AttributeValue::TAGS.to_vec();
        expected.sort_unstable();

        assert_eq!(tags, expected, "every tag needs exactly one sample");
    }

    #[test]
    fn test_round_trip_each_tag() {
        for sample in samples() {
            let tag = sample.tag();

            let native = decode(sample.clone());
            assert_eq!(decode(encode(native.clone())), native, "tag {tag}");

            let wire = sample.to_json();
            assert_eq!(
                AttributeValue::from_json(&wire).unwrap(),
                sample,
                "tag {tag}"
            );
        }
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(
            decode_json(&json!({"S": "router1"})).unwrap(),
            Value::String("router1".to_string())
        );
        assert_eq!(
            decode_json(&json!({"N": "42"})).unwrap(),
            Value::Number(Number::from(42))
        );
        assert_eq!(
            decode_json(&json!({"BOOL": false})).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(decode_json(&json!({"NULL": true})).unwrap(), Value::Null);
        assert_eq!(
            decode_json(&json!({"B": "3q2+7w=="})).unwrap(),
            Value::Binary(vec![0xde, 0xad, 0xbe, 0xef])
        );
    }

    #[test]
    fn test_decode_nested_five_levels() {
        let wire = json!({"M": {"a": {"L": [{"M": {"b": {"L": [{"M": {"leaf": {"N": "5"}}}]}}}]}}});

        let leaf = Value::Map(BTreeMap::from([(
            "leaf".to_string(),
            Value::Number(Number::from(5)),
        )]));
        let expected = Value::Map(BTreeMap::from([(
            "a".to_string(),
            Value::List(vec![Value::Map(BTreeMap::from([(
                "b".to_string(),
                Value::List(vec![leaf]),
            )]))]),
        )]));

        let decoded = decode_json(&wire).unwrap();
        assert_eq!(decoded, expected);
        assert_eq!(decode(encode(decoded.clone())), decoded);
        assert_eq!(
            serde_json::to_value(&decoded).unwrap(),
            json!({"a": [{"b": [{"leaf": 5}]}]})
        );
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = decode_json(&json!({"XS": "?"})).unwrap_err();
        assert_eq!(err, DecodeError::unknown_type_tag("XS"));

        // Deep inside a map the error keeps its attribute path.
        let err = decode_json(&json!({"M": {"inner": {"L": [{"DATE": "2024"}]}}})).unwrap_err();
        assert!(err.is_unknown_tag());
        assert!(err.to_string().contains("inner"));
    }

    #[test]
    fn test_record_with_unknown_tag_yields_no_partial_output() {
        let raw: RawRecord = serde_json::from_value(json!({
            "name": {"S": "router1"},
            "active": {"BOOL": true},
            "weird": {"ZZ": 1}
        }))
        .unwrap();

        let result = decode_record(&raw);
        let err = result.expect_err("record must fail as a whole");
        assert!(err.is_unknown_tag());
        assert!(err.to_string().contains("weird"));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            decode_json(&json!({"N": "twelve"})),
            Err(DecodeError::MalformedValue { .. })
        ));
        assert!(matches!(
            decode_json(&json!({"S": 12})),
            Err(DecodeError::MalformedValue { .. })
        ));
        assert!(matches!(
            decode_json(&json!({"B": "not base64!"})),
            Err(DecodeError::MalformedValue { .. })
        ));
        assert!(matches!(
            decode_json(&json!({"SS": "eth0"})),
            Err(DecodeError::MalformedValue { .. })
        ));
        assert!(matches!(
            decode_json(&json!({"M": []})),
            Err(DecodeError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            decode_json(&json!("router1")),
            Err(DecodeError::InvalidShape { .. })
        ));
        assert!(matches!(
            decode_json(&json!({})),
            Err(DecodeError::InvalidShape { .. })
        ));
        assert!(matches!(
            decode_json(&json!({"S": "a", "N": "1"})),
            Err(DecodeError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_decode_device_record() {
        let raw: RawRecord = serde_json::from_value(json!({
            "name": {"S": "router1"},
            "active": {"BOOL": true}
        }))
        .unwrap();

        let decoded = decode_record(&raw).unwrap();
        assert_eq!(
            serde_json::to_value(&decoded).unwrap(),
            json!({"name": "router1", "active": true})
        );
    }

    #[test]
    fn test_decoded_record_keeps_full_number_precision() {
        let raw: RawRecord = serde_json::from_value(json!({
            "serial": {"N": "12345678901234567890123"},
            "ratio": {"N": "0.12345678901234567890"}
        }))
        .unwrap();

        let decoded = decode_record(&raw).unwrap();
        assert_eq!(
            serde_json::to_string(&decoded).unwrap(),
            r#"{"ratio":0.12345678901234567890,"serial":12345678901234567890123}"#
        );
    }

    #[test]
    fn test_encode_record_round_trip() {
        let device = record([
            ("mac_address", Value::String("aa:bb:cc:dd:ee:ff".to_string())),
            ("last_active", Value::Number(Number::from(1_700_000_000))),
            ("is_active", Value::Bool(false)),
        ]);

        let raw = encode_record(device.clone());
        assert_eq!(raw["is_active"], json!({"BOOL": false}));
        assert_eq!(decode_record(&raw).unwrap(), device);
    }
}
