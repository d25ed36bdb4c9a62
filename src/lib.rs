//! # karabo-bridge-client
//!
//! Rust client for the Karabo bridge protocol.
//!
//! A bridge server streams detector and device data, one train at a time.
//! The client sends a `next` request and receives a multipart reply made of
//! `(header, payload)` frame pairs, which it decodes into per-source
//! packages.
//!
//! ## Architecture
//!
//! - **Transport**: any [`transport::Transport`]. Bridge servers speak
//!   ZeroMQ REQ/REP, provided by `ZmqTransport` with the `zmq` feature.
//!   The always-available [`transport::StreamTransport`] frames multipart
//!   messages with its own envelope and serves loopback tests and relays;
//!   it cannot talk to a ZeroMQ server.
//! - **Protocol**: MsgPack headers tagging each payload as `msgpack`,
//!   `array` or `ImageData`
//! - **Data**: generic values with checked casts, and zero-copy array views
//!
//! ## Example
//!
//! ```ignore
//! use karabo_bridge_client::Client;
//!
//! fn main() -> karabo_bridge_client::Result<()> {
//!     let mut client = Client::builder()
//!         .endpoint("tcp://localhost:4545")
//!         .connect_zmq()?;
//!     let reply = client.next_reply()?;
//!
//!     let xgm = &reply["SA1_XTD2_XGM/DOOCS/MAIN"];
//!     let train_id: u64 = xgm["trainId"].cast()?;
//!     if let Some(view) = xgm.array("data.intensityTD") {
//!         let intensity: Vec<f32> = view.to_vec()?;
//!         println!("train {}: {} samples", train_id, intensity.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod inspect;
pub mod protocol;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder, SessionState};
pub use config::ClientConfig;
pub use data::{ArrayView, DType, DataPackage, Reply, Value};
pub use error::{BridgeError, Result};
pub use protocol::{Decoder, SourcePolicy};
