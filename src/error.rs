//! Error types for karabo-bridge-client.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZeroMQ socket error.
    #[cfg(feature = "zmq")]
    #[error("ZeroMQ error: {0}")]
    Zmq(#[from] zmq::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// Malformed MsgPack bytes.
    #[error("MsgPack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Decoded MsgPack has the wrong overall structure (e.g. root is not a map).
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Frame sequence violates the header/payload pairing or ordering rules.
    #[error("Framing error: {0}")]
    Framing(String),

    /// A header lacks a field required for its content kind.
    #[error("Header is missing required field '{0}'")]
    MissingField(&'static str),

    /// A header declares a content kind this client does not understand.
    #[error("Unknown data content: {0}")]
    UnknownContent(String),

    /// A typed cast was requested on a value or array of another type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Type actually held.
        found: String,
    },

    /// Array shape product exceeds the addressable size.
    #[error("Unmanageable array size for shape {0:?}")]
    Overflow(Vec<usize>),

    /// Session operation invoked from the wrong state.
    #[error("Usage error: {0}")]
    Usage(&'static str),

    /// A pair inside a group declared a different source than the group.
    #[error("Source mismatch: group opened by '{expected}', pair declares '{found}'")]
    SourceMismatch {
        /// Source of the opening header.
        expected: String,
        /// Source of the offending header.
        found: String,
    },

    /// Invalid client configuration (e.g. unsupported endpoint scheme).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl BridgeError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl ToString) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
