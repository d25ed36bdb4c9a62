//! Client configuration.
//!
//! Every field has a default, so a JSON document only needs the fields it
//! changes:
//!
//! ```
//! use karabo_bridge_client::config::ClientConfig;
//! use karabo_bridge_client::protocol::SourcePolicy;
//!
//! let config = ClientConfig::from_json_str(
//!     r#"{"endpoint": "tcp://exflong:4545", "source_policy": "require_match"}"#,
//! )
//! .unwrap();
//! assert_eq!(config.source_policy, SourcePolicy::RequireMatch);
//! assert_eq!(config.read_timeout(), None);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::SourcePolicy;
use crate::transport::DEFAULT_MAX_FRAME_SIZE;

/// Default server endpoint.
pub const DEFAULT_ENDPOINT: &str = "tcp://localhost:4545";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `tcp://host:port` or `ipc://path`.
    pub endpoint: String,
    /// Source validation inside a group.
    pub source_policy: SourcePolicy,
    /// Largest frame accepted from the server, in bytes.
    pub max_frame_size: u32,
    /// Socket read timeout; absent blocks forever.
    pub read_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source_policy: SourcePolicy::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The socket read timeout. Zero is raised to 1 ms, since sockets reject
    /// a zero timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
    }
}
