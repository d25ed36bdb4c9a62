//! Bridge protocol - headers and the reply decoder.
//!
//! This module implements the application protocol on top of the transport:
//! - MsgPack header frames with `content` and `source` tags
//! - Grouping of `(header, payload)` pairs into per-source packages

mod decoder;
mod header;

pub use decoder::{decode_reply, Decoder, SourcePolicy, METADATA_KEY};
pub use header::{ArraySpec, ContentKind, Header, TRIGGER};
