//! Frame grouper: turns one multipart reply into a [`Reply`].
//!
//! A reply is a flat sequence of `(header, payload)` frame pairs. A pair with
//! `content = "msgpack"` opens a group for its source; the `array` and
//! `ImageData` pairs that follow extend it until the next `msgpack` pair or
//! the end of the reply:
//!
//! ```text
//! (msgpack, A) (array, A.p1) (array, A.p2) (msgpack, B) (ImageData, B.img)
//! └──────────── package A ────────────────┘└──────── package B ─────────┘
//! ```
//!
//! Decoding is all-or-nothing: any error discards the whole reply.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::header::{ArraySpec, ContentKind, Header};
use crate::codec::MsgPackCodec;
use crate::data::{checked_size, DataPackage, Reply, Value};
use crate::error::{BridgeError, Result};

/// Key whose map value is flattened into the package's values.
pub const METADATA_KEY: &str = "metadata";

/// What to do when a pair inside a group names a different source than the
/// `msgpack` header that opened it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePolicy {
    /// Use the opening header's source, ignore the rest.
    #[default]
    TrustOpening,
    /// Fail with [`BridgeError::SourceMismatch`].
    RequireMatch,
}

/// Decoder state threaded through the pair loop.
enum GroupState {
    NoGroupOpen,
    GroupOpen {
        source: String,
        package: DataPackage,
    },
}

/// Decoder for bridge protocol replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    source_policy: SourcePolicy,
}

impl Decoder {
    /// Create a decoder that trusts the opening header's source.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_policy(source_policy: SourcePolicy) -> Self {
        Self { source_policy }
    }

    pub fn source_policy(&self) -> SourcePolicy {
        self.source_policy
    }

    /// Decode the frames of one reply.
    ///
    /// Frames are moved into the resulting packages; array views borrow them
    /// without copying.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Framing`] for an odd frame count, an array pair before
    ///   any `msgpack` pair, or an array payload shorter than its shape
    /// - [`BridgeError::MissingField`], [`BridgeError::UnknownContent`],
    ///   [`BridgeError::TypeMismatch`] for bad headers
    /// - [`BridgeError::Overflow`] for an unmanageable shape
    /// - [`BridgeError::Decode`] / [`BridgeError::Malformed`] for bad MsgPack
    /// - [`BridgeError::SourceMismatch`] under [`SourcePolicy::RequireMatch`]
    pub fn decode(&self, frames: Vec<Bytes>) -> Result<Reply> {
        if frames.len() % 2 != 0 {
            return Err(BridgeError::Framing(format!(
                "the multipart message is expected to contain (header, data) pairs, got {} frames",
                frames.len()
            )));
        }

        let mut reply = Reply::new();
        let mut state = GroupState::NoGroupOpen;
        let mut frames = frames.into_iter();

        while let (Some(header_frame), Some(payload)) = (frames.next(), frames.next()) {
            let header = Header::decode(&header_frame)?;

            state = match header.content {
                ContentKind::MsgPack => {
                    if let GroupState::GroupOpen { source, package } = state {
                        reply.seal(source, package);
                    }
                    let mut package = DataPackage::new();
                    insert_values(&mut package, &payload)?;
                    package.retain(header_frame);
                    package.retain(payload);
                    GroupState::GroupOpen {
                        source: header.source,
                        package,
                    }
                }
                ContentKind::Array | ContentKind::ImageData => {
                    let GroupState::GroupOpen {
                        source,
                        mut package,
                    } = state
                    else {
                        return Err(BridgeError::Framing(format!(
                            "'{}' pair for '{}' before any 'msgpack' pair",
                            header.content, header.source
                        )));
                    };
                    self.check_source(&source, &header)?;

                    let spec = header.array_spec()?;
                    check_payload_len(&spec, &payload)?;
                    package.retain(header_frame);
                    let frame = package.retain(payload);
                    if package.insert_array(spec.path.clone(), frame, spec.shape, spec.dtype) {
                        tracing::warn!("Array '{}' of '{}' sent twice, keeping the last", spec.path, source);
                    }
                    GroupState::GroupOpen { source, package }
                }
            };
        }

        if let GroupState::GroupOpen { source, package } = state {
            reply.seal(source, package);
        }

        Ok(reply)
    }

    fn check_source(&self, group_source: &str, header: &Header) -> Result<()> {
        if self.source_policy == SourcePolicy::RequireMatch && header.source != group_source {
            return Err(BridgeError::SourceMismatch {
                expected: group_source.to_string(),
                found: header.source.clone(),
            });
        }
        Ok(())
    }
}

/// Decode a reply with the default decoder.
pub fn decode_reply(frames: Vec<Bytes>) -> Result<Reply> {
    Decoder::new().decode(frames)
}

/// Fill a fresh package from a `msgpack` payload.
///
/// Entries of a `metadata` map share the namespace of the top-level keys; on
/// collision the entry later in wire order wins.
fn insert_values(package: &mut DataPackage, payload: &[u8]) -> Result<()> {
    for (key, value) in MsgPackCodec::decode_map(payload)? {
        match value {
            Value::Map(entries) if key == METADATA_KEY => {
                for (meta_key, meta_value) in entries {
                    let meta_key = meta_key.as_key().map(str::to_string).ok_or_else(|| {
                        BridgeError::Malformed(format!(
                            "metadata key of type {} is not a string",
                            meta_key.wire_type()
                        ))
                    })?;
                    insert_value(package, meta_key, meta_value);
                }
            }
            value => insert_value(package, key, value),
        }
    }
    Ok(())
}

fn insert_value(package: &mut DataPackage, key: String, value: Value) {
    if package.value(&key).is_some() {
        tracing::warn!("Key '{}' repeated in payload, keeping the last", key);
    }
    package.insert_value(key, value);
}

/// Reject payloads too short for their declared shape.
fn check_payload_len(spec: &ArraySpec, payload: &[u8]) -> Result<()> {
    let size = checked_size(&spec.shape)?;
    let Some(width) = spec.dtype.width() else {
        return Ok(());
    };
    let needed = size
        .checked_mul(width)
        .ok_or_else(|| BridgeError::Overflow(spec.shape.clone()))?;
    if payload.len() < needed {
        return Err(BridgeError::Framing(format!(
            "array '{}' has {} payload bytes, shape {:?} of {} needs {}",
            spec.path,
            payload.len(),
            spec.shape,
            spec.dtype,
            needed
        )));
    }
    Ok(())
}
