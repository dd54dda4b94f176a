//! Strict CBOR helpers over `ciborium::value::Value`.
//!
//! Handshake messages are decoded field by field so that a missing key, a
//! duplicate key or a wrong major type is a hard error rather than a default.

use crate::{Error, Result};
use ciborium::value::Value;
use std::io::Cursor;

pub(crate) fn to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| Error::Encode(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Decode exactly one CBOR item; trailing bytes are rejected.
pub(crate) fn from_slice(bytes: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| Error::Decode(format!("invalid CBOR: {e}")))?;

    if cursor.position() as usize != bytes.len() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after CBOR item",
            bytes.len() - cursor.position() as usize
        )));
    }
    Ok(value)
}

pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

pub(crate) fn bytes(b: &[u8]) -> Value {
    Value::Bytes(b.to_vec())
}

pub(crate) fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

/// Build a CBOR map with text keys, preserving entry order.
pub(crate) fn map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (text(k), v)).collect())
}

/// Typed read access to a CBOR map with text keys.
pub(crate) struct MapReader<'a> {
    entries: &'a [(Value, Value)],
    context: &'static str,
}

impl<'a> MapReader<'a> {
    pub(crate) fn new(value: &'a Value, context: &'static str) -> Result<Self> {
        let Value::Map(entries) = value else {
            return Err(Error::Decode(format!("{context}: expected a CBOR map")));
        };

        for (i, (key, _)) in entries.iter().enumerate() {
            let Value::Text(name) = key else {
                return Err(Error::Decode(format!("{context}: non-text map key")));
            };
            let duplicate = entries[..i]
                .iter()
                .any(|(k, _)| matches!(k, Value::Text(other) if other == name));
            if duplicate {
                return Err(Error::Decode(format!("{context}: duplicate field {name}")));
            }
        }

        Ok(Self { entries, context })
    }

    pub(crate) fn get(&self, key: &str) -> Result<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Text(name) if name == key))
            .map(|(_, v)| v)
            .ok_or_else(|| Error::Decode(format!("{}: missing field {key}", self.context)))
    }

    pub(crate) fn bytes(&self, key: &str) -> Result<&'a [u8]> {
        match self.get(key)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.wrong_type(key, "byte string")),
        }
    }

    pub(crate) fn text(&self, key: &str) -> Result<&'a str> {
        match self.get(key)? {
            Value::Text(s) => Ok(s),
            _ => Err(self.wrong_type(key, "text string")),
        }
    }

    pub(crate) fn uint(&self, key: &str) -> Result<u64> {
        match self.get(key)? {
            Value::Integer(i) => u64::try_from(*i).map_err(|_| self.wrong_type(key, "unsigned integer")),
            _ => Err(self.wrong_type(key, "unsigned integer")),
        }
    }

    pub(crate) fn map(&self, key: &str, context: &'static str) -> Result<MapReader<'a>> {
        MapReader::new(self.get(key)?, context)
    }

    pub(crate) fn array(&self, key: &str) -> Result<&'a [Value]> {
        match self.get(key)? {
            Value::Array(items) => Ok(items),
            _ => Err(self.wrong_type(key, "array")),
        }
    }

    fn wrong_type(&self, key: &str, expected: &str) -> Error {
        Error::Decode(format!("{}: field {key} must be a {expected}", self.context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_reader_fields() {
        let value = map([
            ("name", text("M1")),
            ("blob", bytes(&[1, 2, 3])),
            ("n", uint(7)),
        ]);
        let encoded = to_vec(&value).unwrap();
        let decoded = from_slice(&encoded).unwrap();

        let reader = MapReader::new(&decoded, "test").unwrap();
        assert_eq!(reader.text("name").unwrap(), "M1");
        assert_eq!(reader.bytes("blob").unwrap(), &[1, 2, 3]);
        assert_eq!(reader.uint("n").unwrap(), 7);
        assert!(reader.get("absent").is_err());
    }

    #[test]
    fn test_wrong_major_type_rejected() {
        let value = map([("blob", text("not bytes"))]);
        let reader = MapReader::new(&value, "test").unwrap();
        assert!(matches!(reader.bytes("blob"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let value = Value::Map(vec![(text("a"), uint(1)), (text("a"), uint(2))]);
        assert!(MapReader::new(&value, "test").is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded = to_vec(&map([("a", uint(1))])).unwrap();
        encoded.push(0x00);
        assert!(from_slice(&encoded).is_err());
    }

    #[test]
    fn test_negative_integer_rejected_as_uint() {
        let value = map([("n", Value::Integer((-1i64).into()))]);
        let reader = MapReader::new(&value, "test").unwrap();
        assert!(reader.uint("n").is_err());
    }
}
