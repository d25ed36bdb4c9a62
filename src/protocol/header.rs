//! Bridge protocol headers.
//!
//! Every payload frame of a reply is preceded by a MsgPack header frame:
//!
//! ```text
//! {"source": "SPB_DET_AGIPD1M-1/DET/0CH0:xtdf", "content": "msgpack"}
//! {"source": "...", "content": "array", "path": "image.data",
//!  "shape": [16, 512, 128], "dtype": "uint16"}
//! ```
//!
//! `content` selects how the following payload frame is interpreted.

use std::fmt;

use crate::codec::MsgPackCodec;
use crate::data::{DType, Value};
use crate::error::{BridgeError, Result};

/// Payload sent to ask the server for the next reply.
pub const TRIGGER: &[u8] = b"next";

/// How the payload following a header is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// A MsgPack map of inline values; opens a new source group.
    MsgPack,
    /// Raw array bytes described by the header.
    Array,
    /// Raw image bytes; treated exactly like `Array`.
    ImageData,
}

impl ContentKind {
    /// Parse the header's `content` tag.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "msgpack" => Ok(ContentKind::MsgPack),
            "array" => Ok(ContentKind::Array),
            "ImageData" => Ok(ContentKind::ImageData),
            other => Err(BridgeError::UnknownContent(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::MsgPack => "msgpack",
            ContentKind::Array => "array",
            ContentKind::ImageData => "ImageData",
        }
    }

    /// Whether the payload is raw array bytes.
    #[inline]
    pub fn is_array(self) -> bool {
        matches!(self, ContentKind::Array | ContentKind::ImageData)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of an array payload, taken from its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySpec {
    /// Destination key in the data package.
    pub path: String,
    pub shape: Vec<usize>,
    /// Normalized element type.
    pub dtype: DType,
}

/// A decoded header frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub content: ContentKind,
    pub source: String,
    /// All header entries in wire order, `content` and `source` included.
    fields: Vec<(String, Value)>,
}

impl Header {
    /// Decode a header frame.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Decode`] / [`BridgeError::Malformed`] if the frame is
    ///   not a MsgPack map
    /// - [`BridgeError::MissingField`] if `content` or `source` is absent
    /// - [`BridgeError::UnknownContent`] for an unrecognized `content`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_fields(MsgPackCodec::decode_map(bytes)?)
    }

    /// Build a header from already decoded map entries.
    pub fn from_fields(fields: Vec<(String, Value)>) -> Result<Self> {
        let content: String = required(&fields, "content")?.cast()?;
        let source: String = required(&fields, "source")?.cast()?;
        Ok(Self {
            content: ContentKind::parse(&content)?,
            source,
            fields,
        })
    }

    /// Look up any header entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.fields, key)
    }

    /// Extract `path`, `shape` and `dtype` for an array payload.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingField`] if one of them is absent and
    /// [`BridgeError::TypeMismatch`] if one has the wrong type.
    pub fn array_spec(&self) -> Result<ArraySpec> {
        let path: String = required(&self.fields, "path")?.cast()?;
        let shape: Vec<usize> = required(&self.fields, "shape")?.cast()?;
        let dtype: String = required(&self.fields, "dtype")?.cast()?;
        Ok(ArraySpec {
            path,
            shape,
            dtype: DType::from_header(&dtype),
        })
    }
}

fn lookup<'a>(fields: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn required<'a>(fields: &'a [(String, Value)], key: &'static str) -> Result<&'a Value> {
    lookup(fields, key).ok_or(BridgeError::MissingField(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ArrayHeader<'a> {
        source: &'a str,
        content: &'a str,
        path: &'a str,
        shape: Vec<u32>,
        dtype: &'a str,
    }

    fn encode_pairs(pairs: &[(&str, &str)]) -> Vec<u8> {
        let map: std::collections::BTreeMap<&str, &str> = pairs.iter().copied().collect();
        MsgPackCodec::encode(&map).unwrap()
    }

    #[test]
    fn test_decode_msgpack_header() {
        let bytes = encode_pairs(&[("source", "XGM"), ("content", "msgpack")]);
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.content, ContentKind::MsgPack);
        assert_eq!(header.source, "XGM");
        assert_eq!(header.get("content"), Some(&Value::Str("msgpack".into())));
    }

    #[test]
    fn test_decode_array_header() {
        let bytes = MsgPackCodec::encode(&ArrayHeader {
            source: "DET",
            content: "ImageData",
            path: "image.data",
            shape: vec![2, 3],
            dtype: "uint16",
        })
        .unwrap();

        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.content, ContentKind::ImageData);
        assert!(header.content.is_array());

        let spec = header.array_spec().unwrap();
        assert_eq!(spec.path, "image.data");
        assert_eq!(spec.shape, vec![2, 3]);
        assert_eq!(spec.dtype, DType::U16);
    }

    #[test]
    fn test_missing_content_and_source() {
        let bytes = encode_pairs(&[("source", "XGM")]);
        assert!(matches!(
            Header::decode(&bytes),
            Err(BridgeError::MissingField("content"))
        ));

        let bytes = encode_pairs(&[("content", "msgpack")]);
        assert!(matches!(
            Header::decode(&bytes),
            Err(BridgeError::MissingField("source"))
        ));
    }

    #[test]
    fn test_unknown_content() {
        let bytes = encode_pairs(&[("source", "XGM"), ("content", "hdf5")]);
        match Header::decode(&bytes) {
            Err(BridgeError::UnknownContent(kind)) => assert_eq!(kind, "hdf5"),
            other => panic!("expected UnknownContent, got {:?}", other),
        }
    }

    #[test]
    fn test_array_spec_missing_fields() {
        let bytes = encode_pairs(&[("source", "DET"), ("content", "array"), ("path", "x")]);
        let header = Header::decode(&bytes).unwrap();
        assert!(matches!(
            header.array_spec(),
            Err(BridgeError::MissingField("shape"))
        ));
    }

    #[test]
    fn test_array_spec_rejects_negative_dimension() {
        #[derive(Serialize)]
        struct BadShape {
            source: &'static str,
            content: &'static str,
            path: &'static str,
            shape: Vec<i32>,
            dtype: &'static str,
        }
        let bytes = MsgPackCodec::encode(&BadShape {
            source: "DET",
            content: "array",
            path: "x",
            shape: vec![4, -1],
            dtype: "float32",
        })
        .unwrap();
        let header = Header::decode(&bytes).unwrap();
        assert!(matches!(
            header.array_spec(),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_header_must_be_a_map() {
        let bytes = MsgPackCodec::encode(&"msgpack").unwrap();
        assert!(matches!(
            Header::decode(&bytes),
            Err(BridgeError::Malformed(_))
        ));
    }
}
