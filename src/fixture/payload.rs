//! Payload encoding
//!
//! A payload is written in fixtures as `{ "kind": ..., "value": ... }` and
//! becomes raw message bytes. The same encoding is used for outgoing
//! messages and for expected queue contents.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::chain::ProgramId;
use crate::common::{decode_hex, encode_hex, Error, Result};

/// Deployed program addresses by fixture-local id
pub type ProgramMap = BTreeMap<u64, ProgramId>;

/// A message payload, decoded from its fixture form
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPayload")]
pub enum Payload {
    /// Raw bytes
    Bytes(Vec<u8>),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// UTF-8 text; `{N}` is replaced with the address of program N
    Utf8(String),
    /// No kind given: bytes taken from the value verbatim
    Raw(Vec<u8>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PayloadKind {
    Bytes,
    I32,
    I64,
    F32,
    F64,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    kind: Option<PayloadKind>,
    value: Value,
}

impl TryFrom<RawPayload> for Payload {
    type Error = Error;

    fn try_from(raw: RawPayload) -> Result<Self> {
        decode_payload(raw).map_err(Error::InvalidPayload)
    }
}

fn decode_payload(raw: RawPayload) -> std::result::Result<Payload, String> {
    let value = raw.value;
    let payload = match raw.kind {
        Some(PayloadKind::Bytes) => Payload::Bytes(bytes_value(&value)?),
        Some(PayloadKind::I32) => {
            let n = integer_value(&value)?;
            Payload::I32(i32::try_from(n).map_err(|_| format!("{} does not fit in i32", n))?)
        }
        Some(PayloadKind::I64) => Payload::I64(integer_value(&value)?),
        Some(PayloadKind::F32) => Payload::F32(float_value(&value)? as f32),
        Some(PayloadKind::F64) => Payload::F64(float_value(&value)?),
        Some(PayloadKind::Utf8) => match value {
            Value::String(s) => Payload::Utf8(s),
            other => return Err(format!("utf-8 payload must be a string, got {}", other)),
        },
        None => Payload::Raw(match &value {
            Value::String(s) if s.starts_with("0x") => {
                decode_hex("payload", s).map_err(|e| e.to_string())?
            }
            Value::String(s) => s.as_bytes().to_vec(),
            other => bytes_value(other)?,
        }),
    };
    Ok(payload)
}

fn bytes_value(value: &Value) -> std::result::Result<Vec<u8>, String> {
    match value {
        Value::String(s) => decode_hex("bytes payload", s).map_err(|e| e.to_string()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| format!("{} is not a byte", item))
            })
            .collect(),
        Value::Number(n) => Err(format!(
            "bytes payload must be hex or a byte array, got the number {} (quote hex values in YAML: \"0x..\")",
            n
        )),
        other => Err(format!("bytes payload must be hex or a byte array, got {}", other)),
    }
}

fn integer_value(value: &Value) -> std::result::Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{} is not an integer", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not an integer", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn float_value(value: &Value) -> std::result::Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a number", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a number", s)),
        other => Err(format!("expected a number, got {}", other)),
    }
}

impl Payload {
    /// Encode to wire bytes, resolving `{N}` placeholders against `programs`
    pub fn encode(&self, programs: &ProgramMap) -> Result<Vec<u8>> {
        Ok(match self {
            Payload::Bytes(bytes) | Payload::Raw(bytes) => bytes.clone(),
            Payload::I32(n) => n.to_le_bytes().to_vec(),
            Payload::I64(n) => n.to_le_bytes().to_vec(),
            Payload::F32(n) => n.to_le_bytes().to_vec(),
            Payload::F64(n) => n.to_le_bytes().to_vec(),
            Payload::Utf8(text) => substitute_placeholders(text, programs)?.into_bytes(),
        })
    }

    /// Program ids referenced by `{N}` placeholders
    pub fn placeholders(&self) -> Vec<u64> {
        match self {
            Payload::Utf8(text) => scan_placeholders(text)
                .into_iter()
                .map(|(_, _, id)| id)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Find `{N}` placeholders as (start, end, id) byte ranges
fn scan_placeholders(text: &str) -> Vec<(usize, usize, u64)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let digits = bytes[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let close = i + 1 + digits;
            if digits > 0 && bytes.get(close) == Some(&b'}') {
                if let Ok(id) = text[i + 1..close].parse() {
                    found.push((i, close + 1, id));
                    i = close + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    found
}

/// Replace each `{N}` with the unprefixed hex address of program N
pub fn substitute_placeholders(text: &str, programs: &ProgramMap) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end, id) in scan_placeholders(text) {
        let program = programs.get(&id).ok_or(Error::UnknownProgram(id))?;
        out.push_str(&text[last..start]);
        out.push_str(&program.to_hex());
        last = end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Payload {
        serde_json::from_str(json).unwrap()
    }

    fn programs() -> ProgramMap {
        let mut map = ProgramMap::new();
        map.insert(0, ProgramId([0x11; 32]));
        map.insert(7, ProgramId([0xab; 32]));
        map
    }

    #[test]
    fn test_numeric_kinds_are_little_endian() {
        let empty = ProgramMap::new();
        assert_eq!(
            parse(r#"{"kind":"i32","value":42}"#).encode(&empty).unwrap(),
            vec![42, 0, 0, 0]
        );
        assert_eq!(
            parse(r#"{"kind":"i32","value":-2}"#).encode(&empty).unwrap(),
            vec![0xfe, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            parse(r#"{"kind":"i64","value":258}"#).encode(&empty).unwrap(),
            vec![2, 1, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            parse(r#"{"kind":"f32","value":1.5}"#).encode(&empty).unwrap(),
            1.5f32.to_le_bytes().to_vec()
        );
        assert_eq!(
            parse(r#"{"kind":"f64","value":-0.25}"#).encode(&empty).unwrap(),
            (-0.25f64).to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_numeric_decode_recovers_value() {
        let empty = ProgramMap::new();
        let bytes = Payload::I64(i64::MIN).encode(&empty).unwrap();
        assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), i64::MIN);
        let bytes = Payload::F64(std::f64::consts::PI).encode(&empty).unwrap();
        assert_eq!(f64::from_le_bytes(bytes.try_into().unwrap()), std::f64::consts::PI);
    }

    #[test]
    fn test_i32_out_of_range_rejected() {
        let result: std::result::Result<Payload, _> =
            serde_json::from_str(r#"{"kind":"i32","value":4294967296}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_bytes_kind_accepts_hex_and_arrays() {
        let empty = ProgramMap::new();
        assert_eq!(
            parse(r#"{"kind":"bytes","value":"0x0102ff"}"#).encode(&empty).unwrap(),
            vec![1, 2, 0xff]
        );
        assert_eq!(
            parse(r#"{"kind":"bytes","value":[1,2,255]}"#).encode(&empty).unwrap(),
            vec![1, 2, 0xff]
        );
        let bad: std::result::Result<Payload, _> =
            serde_json::from_str(r#"{"kind":"bytes","value":[256]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_utf8_substitutes_placeholder() {
        let payload = parse(r#"{"kind":"utf-8","value":"send to {7}"}"#);
        let encoded = payload.encode(&programs()).unwrap();
        assert_eq!(encoded, format!("send to {}", "ab".repeat(32)).into_bytes());
        assert!(!String::from_utf8(encoded).unwrap().contains("0x"));
    }

    #[test]
    fn test_utf8_without_placeholder_is_unchanged() {
        let payload = parse(r#"{"kind":"utf-8","value":"PING {not} {}"}"#);
        assert_eq!(payload.encode(&programs()).unwrap(), b"PING {not} {}".to_vec());
        assert!(payload.placeholders().is_empty());
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let payload = parse(r#"{"kind":"utf-8","value":"{3}"}"#);
        assert!(matches!(
            payload.encode(&programs()),
            Err(Error::UnknownProgram(3))
        ));
        assert_eq!(payload.placeholders(), vec![3]);
    }

    #[test]
    fn test_absent_kind_passes_value_through() {
        let empty = ProgramMap::new();
        assert_eq!(parse(r#"{"value":"0xdead"}"#).encode(&empty).unwrap(), vec![0xde, 0xad]);
        assert_eq!(parse(r#"{"value":"{0}"}"#).encode(&programs()).unwrap(), b"{0}".to_vec());
        assert_eq!(parse(r#"{"value":[9, 8]}"#).encode(&empty).unwrap(), vec![9, 8]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: std::result::Result<Payload, _> =
            serde_json::from_str(r#"{"kind":"u128","value":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_payload_error_names_the_problem() {
        let err = serde_json::from_str::<Payload>(r#"{"kind":"utf-8","value":5}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid payload:"), "{}", message);
        assert!(message.contains("must be a string"), "{}", message);
    }

    #[test]
    fn test_numeric_bytes_value_rejected_with_quote_hint() {
        for json in [r#"{"kind":"bytes","value":1}"#, r#"{"value":1}"#] {
            let err = serde_json::from_str::<Payload>(json).unwrap_err();
            assert!(err.to_string().contains("quote hex values in YAML"), "{}", err);
        }
    }
}
