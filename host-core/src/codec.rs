//! The `{json, meta}` value codec.
//!
//! Arbitrary values crossing the wire are split into a plain JSON value and a
//! metadata sidecar that records which paths need special reconstruction
//! (dates, big integers, explicit `undefined`). This keeps schema validators
//! operating purely on canonical [`serde_json::Value`]s while still letting
//! richer Rust types survive a round trip.
//!
//! Round-trip law: `decode(encode(v)) == v` for every [`HostValue`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A value as seen by action code, before it is split into `{json, meta}`
/// for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    /// An integer too large (or required to be exact) to round-trip through
    /// an `f64`.
    BigInt(i128),
    String(String),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Array(Vec<HostValue>),
    Object(BTreeMap<String, HostValue>),
}

impl HostValue {
    /// Flatten this value down to plain JSON, collapsing the Rust-only
    /// variants (`Undefined` becomes `Null`, `BigInt`/`Date` become their
    /// wire-encoded forms) for consumption by schema validators that only
    /// know canonical JSON.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Null | Self::Undefined => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            Self::BigInt(i) => Value::String(i.to_string()),
            Self::String(s) => Value::String(s),
            Self::Date(millis) => Value::Number(millis.into()),
            Self::Array(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Object(fields) => {
                Value::Object(fields.into_iter().map(|(k, v)| (k, v.into_json())).collect())
            }
        }
    }
}

impl From<&Value> for HostValue {
    /// Lift a plain JSON value with no special-cased paths. No `Undefined`,
    /// `BigInt` or `Date` variants are ever produced here: those only arise
    /// from decoding a wire payload that carried a meta sidecar.
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(fields) => {
                Self::Object(fields.iter().map(|(k, v)| (k.clone(), Self::from(v))).collect())
            }
        }
    }
}

/// Per-path type tags recorded alongside the plain JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaTag {
    BigInt,
    Date,
    Undefined,
}

impl MetaTag {
    const fn as_str(self) -> &'static str {
        match self {
            Self::BigInt => "bigint",
            Self::Date => "date",
            Self::Undefined => "undefined",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "bigint" => Some(Self::BigInt),
            "date" => Some(Self::Date),
            "undefined" => Some(Self::Undefined),
            _ => None,
        }
    }
}

/// Split a [`HostValue`] into its wire-ready `{json, meta}` pair.
#[must_use]
pub fn serialize(value: &HostValue) -> (Value, Value) {
    let mut meta = Map::new();
    let json = encode_node(value, &mut meta, "$");
    (json, Value::Object(meta))
}

/// Reassemble a [`HostValue`] from its `{json, meta}` wire pair.
///
/// # Errors
/// Returns an error if `meta` references a path that does not exist in
/// `json`, or tags a path with an unrecognized or mismatched kind.
pub fn deserialize(json: &Value, meta: &Value) -> Result<HostValue, String> {
    let empty = Map::new();
    let meta_map = match meta {
        Value::Object(m) => m,
        Value::Null => &empty,
        other => return Err(format!("meta sidecar must be an object, got {other}")),
    };
    decode_node(json, meta_map, "$")
}

fn encode_node(value: &HostValue, meta: &mut Map<String, Value>, path: &str) -> Value {
    match value {
        HostValue::Null => Value::Null,
        HostValue::Undefined => {
            meta.insert(path.to_string(), Value::String(MetaTag::Undefined.as_str().into()));
            Value::Null
        }
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        HostValue::BigInt(i) => {
            meta.insert(path.to_string(), Value::String(MetaTag::BigInt.as_str().into()));
            Value::String(i.to_string())
        }
        HostValue::String(s) => Value::String(s.clone()),
        HostValue::Date(millis) => {
            meta.insert(path.to_string(), Value::String(MetaTag::Date.as_str().into()));
            Value::Number((*millis).into())
        }
        HostValue::Array(items) => {
            let encoded = items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_node(item, meta, &format!("{path}.{i}")))
                .collect();
            Value::Array(encoded)
        }
        HostValue::Object(fields) => {
            let mut out = Map::new();
            for (k, v) in fields {
                out.insert(k.clone(), encode_node(v, meta, &format!("{path}.{k}")));
            }
            Value::Object(out)
        }
    }
}

fn decode_node(json: &Value, meta: &Map<String, Value>, path: &str) -> Result<HostValue, String> {
    if let Some(tag) = meta.get(path) {
        let tag_str = tag
            .as_str()
            .ok_or_else(|| format!("meta tag at {path} must be a string"))?;
        let tag = MetaTag::parse(tag_str).ok_or_else(|| format!("unknown meta tag {tag_str} at {path}"))?;
        return match tag {
            MetaTag::Undefined => Ok(HostValue::Undefined),
            MetaTag::BigInt => {
                let s = json
                    .as_str()
                    .ok_or_else(|| format!("bigint payload at {path} must be a string"))?;
                s.parse::<i128>()
                    .map(HostValue::BigInt)
                    .map_err(|e| format!("invalid bigint at {path}: {e}"))
            }
            MetaTag::Date => {
                let millis = json
                    .as_i64()
                    .ok_or_else(|| format!("date payload at {path} must be an integer"))?;
                Ok(HostValue::Date(millis))
            }
        };
    }

    match json {
        Value::Null => Ok(HostValue::Null),
        Value::Bool(b) => Ok(HostValue::Bool(*b)),
        Value::Number(n) => n
            .as_f64()
            .map(HostValue::Number)
            .ok_or_else(|| format!("number at {path} is out of f64 range")),
        Value::String(s) => Ok(HostValue::String(s.clone())),
        Value::Array(items) => {
            let decoded = items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_node(item, meta, &format!("{path}.{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(HostValue::Array(decoded))
        }
        Value::Object(fields) => {
            let mut out = BTreeMap::new();
            for (k, v) in fields {
                out.insert(k.clone(), decode_node(v, meta, &format!("{path}.{k}"))?);
            }
            Ok(HostValue::Object(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: HostValue) {
        let (json, meta) = serialize(&value);
        let decoded = deserialize(&json, &meta).expect("decode must succeed");
        assert_eq!(decoded, value);
    }

    #[test]
    fn primitives_roundtrip() {
        roundtrip(HostValue::Null);
        roundtrip(HostValue::Bool(true));
        roundtrip(HostValue::Number(42.5));
        roundtrip(HostValue::String("hello".into()));
    }

    #[test]
    fn bigint_roundtrips_exactly() {
        roundtrip(HostValue::BigInt(9_223_372_036_854_775_807_i128 * 10));
    }

    #[test]
    fn date_roundtrips() {
        roundtrip(HostValue::Date(1_700_000_000_000));
    }

    #[test]
    fn undefined_roundtrips() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), HostValue::Undefined);
        fields.insert("b".to_string(), HostValue::Number(1.0));
        roundtrip(HostValue::Object(fields));
    }

    #[test]
    fn nested_array_with_mixed_meta_roundtrips() {
        roundtrip(HostValue::Array(vec![
            HostValue::Date(0),
            HostValue::BigInt(1),
            HostValue::Array(vec![HostValue::Undefined, HostValue::Null]),
        ]));
    }

    #[test]
    fn plain_json_lifts_with_no_meta() {
        let json = serde_json::json!({ "a": [1, "b", null, true] });
        let host = HostValue::from(&json);
        assert_eq!(host.into_json(), json);
    }

    #[test]
    fn unknown_meta_tag_is_rejected() {
        let json = Value::Null;
        let mut meta = Map::new();
        meta.insert("$".to_string(), Value::String("nonsense".into()));
        assert!(deserialize(&json, &Value::Object(meta)).is_err());
    }
}
