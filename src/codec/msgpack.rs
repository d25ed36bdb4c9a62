//! MsgPack codec using `rmp-serde`.
//!
//! Bridge servers are Python processes packing with `msgpack`; headers and
//! inline payloads are maps with string keys. Typed structs are encoded with
//! `to_vec_named` so they come out as maps as well.
//!
//! # Example
//!
//! ```
//! use karabo_bridge_client::codec::MsgPackCodec;
//! use std::collections::BTreeMap;
//!
//! let mut header = BTreeMap::new();
//! header.insert("source", "SA1_XTD2_XGM/DOOCS/MAIN");
//! header.insert("content", "msgpack");
//!
//! let encoded = MsgPackCodec::encode(&header).unwrap();
//! let entries = MsgPackCodec::decode_map(&encoded).unwrap();
//! assert_eq!(entries.len(), 2);
//! ```

use serde::Deserialize;

use crate::data::Value;
use crate::error::{BridgeError, Result};

/// Deepest nesting of arrays and maps accepted by [`MsgPackCodec::decode_value`].
///
/// Building a [`Value`] recurses once per level; deeper input is a decode
/// error instead of a stack overflow.
pub const MAX_DEPTH: usize = 128;

/// MessagePack codec for headers and inline payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (structs as maps).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a typed value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Decode MsgPack bytes to a generic [`Value`] tree.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Decode`] on malformed input or nesting deeper
    /// than [`MAX_DEPTH`].
    pub fn decode_value(bytes: &[u8]) -> Result<Value> {
        let mut deserializer = rmp_serde::Deserializer::from_read_ref(bytes);
        deserializer.set_max_depth(MAX_DEPTH);
        Ok(Value::deserialize(&mut deserializer)?)
    }

    /// Decode MsgPack bytes whose root must be a map with string keys.
    ///
    /// Entries are returned in wire order.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Decode`] on malformed input and
    /// [`BridgeError::Malformed`] if the root is not a map or a key is not a
    /// string.
    pub fn decode_map(bytes: &[u8]) -> Result<Vec<(String, Value)>> {
        match Self::decode_value(bytes)? {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| match key.as_key() {
                    Some(k) => Ok((k.to_string(), value)),
                    None => Err(BridgeError::Malformed(format!(
                        "map key of type {} is not a string",
                        key.wire_type()
                    ))),
                })
                .collect(),
            other => Err(BridgeError::Malformed(format!(
                "expected a map at the root, found {}",
                other.wire_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestHeader {
        source: String,
        content: String,
    }

    #[test]
    fn test_encode_decode_struct() {
        let header = TestHeader {
            source: "SPB_DET_AGIPD1M-1/DET/0CH0:xtdf".to_string(),
            content: "msgpack".to_string(),
        };

        let encoded = MsgPackCodec::encode(&header).unwrap();
        let decoded: TestHeader = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, header);
    }

    #[test]
    fn test_struct_encodes_as_map() {
        let header = TestHeader {
            source: "x".to_string(),
            content: "array".to_string(),
        };

        let encoded = MsgPackCodec::encode(&header).unwrap();

        // 0x82 = fixmap with 2 elements
        assert_eq!(encoded[0], 0x82, "Expected fixmap with 2 elements");
    }

    #[test]
    fn test_decode_map_preserves_wire_order() {
        let header = TestHeader {
            source: "src".to_string(),
            content: "msgpack".to_string(),
        };
        let encoded = MsgPackCodec::encode(&header).unwrap();

        let entries = MsgPackCodec::decode_map(&encoded).unwrap();
        assert_eq!(entries[0].0, "source");
        assert_eq!(entries[0].1, Value::Str("src".to_string()));
        assert_eq!(entries[1].0, "content");
    }

    #[test]
    fn test_decode_map_rejects_non_map_root() {
        let encoded = MsgPackCodec::encode(&vec![1, 2, 3]).unwrap();
        let result = MsgPackCodec::decode_map(&encoded);
        assert!(matches!(result, Err(BridgeError::Malformed(_))));
    }

    #[test]
    fn test_decode_map_rejects_integer_keys() {
        // {1: 2}
        let result = MsgPackCodec::decode_map(&[0x81, 0x01, 0x02]);
        assert!(matches!(result, Err(BridgeError::Malformed(_))));
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        // 0xc1 is never used in MsgPack
        let result = MsgPackCodec::decode_value(&[0xc1]);
        assert!(matches!(result, Err(BridgeError::Decode(_))));

        // truncated str8
        let result = MsgPackCodec::decode_map(&[0xd9, 0x10, b'a']);
        assert!(matches!(result, Err(BridgeError::Decode(_))));
    }

    #[test]
    fn test_decode_value_nested() {
        let mut inner = std::collections::BTreeMap::new();
        inner.insert("timestamp", 1.5f64);
        let mut outer = std::collections::BTreeMap::new();
        outer.insert("metadata", inner);

        let encoded = MsgPackCodec::encode(&outer).unwrap();
        let value = MsgPackCodec::decode_value(&encoded).unwrap();
        let ts = value.get("metadata").and_then(|m| m.get("timestamp"));
        assert_eq!(ts, Some(&Value::F64(1.5)));
    }

    /// `{"x": [[...[nil]...]]}` with `levels` nested arrays.
    fn nested_arrays(levels: usize) -> Vec<u8> {
        let mut bytes = vec![0x81, 0xa1, b'x'];
        bytes.extend(std::iter::repeat(0x91).take(levels));
        bytes.push(0xc0);
        bytes
    }

    #[test]
    fn test_nesting_within_limit() {
        let value = MsgPackCodec::decode_value(&nested_arrays(100)).unwrap();
        let mut level = value.get("x").unwrap();
        let mut depth = 0;
        while let Some([inner]) = level.as_array() {
            level = inner;
            depth += 1;
        }
        assert_eq!(depth, 100);
        assert!(level.is_nil());
    }

    #[test]
    fn test_nesting_beyond_limit_is_decode_error() {
        for levels in [MAX_DEPTH + 1, 600, 1000, 5000] {
            let result = MsgPackCodec::decode_value(&nested_arrays(levels));
            assert!(matches!(result, Err(BridgeError::Decode(_))), "{} levels", levels);
        }
    }
}
