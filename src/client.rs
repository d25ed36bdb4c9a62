//! Client builder and request/reply session.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring and
//! connecting. The [`Client`] runs one exchange at a time:
//! 1. Send the `next` trigger
//! 2. Receive every frame of the multipart reply
//! 3. Decode the frames into a [`Reply`]
//!
//! # Example
//!
//! ```ignore
//! use karabo_bridge_client::Client;
//!
//! let mut client = Client::builder()
//!     .endpoint("tcp://localhost:4545")
//!     .connect_zmq()?;
//!
//! let reply = client.next_reply()?;
//! for (source, package) in reply.iter() {
//!     let train_id: u64 = package["trainId"].cast()?;
//!     println!("{}: train {}", source, train_id);
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;

use crate::config::ClientConfig;
use crate::data::Reply;
use crate::error::{BridgeError, Result};
use crate::inspect::{render_frames, ReplySummary};
use crate::protocol::{Decoder, SourcePolicy, TRIGGER};
#[cfg(feature = "zmq")]
use crate::transport::ZmqTransport;
use crate::transport::{StreamTransport, Transport};

/// Where the session is in the request/reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to send a request.
    Idle,
    /// A request was sent; its reply has not been fully received.
    AwaitingReply,
}

/// Builder for configuring and creating a bridge client.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the server endpoint (`tcp://host:port` or `ipc://path`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set how the decoder treats differing sources inside a group.
    ///
    /// Default: [`SourcePolicy::TrustOpening`]
    pub fn source_policy(mut self, policy: SourcePolicy) -> Self {
        self.config.source_policy = policy;
        self
    }

    /// Set the largest frame accepted from the server.
    ///
    /// Default: 1 GB
    pub fn max_frame_size(mut self, limit: u32) -> Self {
        self.config.max_frame_size = limit;
        self
    }

    /// Set the socket read timeout, rounded down to whole milliseconds but
    /// never below 1 ms.
    ///
    /// Default: none (block until the reply arrives)
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.config.read_timeout_ms = Some(millis.max(1));
        self
    }

    /// Connect a ZeroMQ REQ socket to the configured endpoint.
    #[cfg(feature = "zmq")]
    pub fn connect_zmq(self) -> Result<Client<ZmqTransport>> {
        let transport = ZmqTransport::connect(&self.config.endpoint)?;
        transport.set_max_frame_size(self.config.max_frame_size)?;
        transport.set_read_timeout(self.config.read_timeout())?;
        Ok(self.build(transport))
    }

    /// Connect to the configured endpoint over the envelope stream
    /// transport.
    pub fn connect(self) -> Result<Client<StreamTransport>> {
        let transport = StreamTransport::connect_with_max_frame_size(
            &self.config.endpoint,
            self.config.max_frame_size,
        )?;
        transport.set_read_timeout(self.config.read_timeout())?;
        Ok(self.build(transport))
    }

    /// Build a client over an already connected transport.
    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        Client {
            transport,
            decoder: Decoder::with_source_policy(self.config.source_policy),
            state: SessionState::Idle,
        }
    }
}

/// A bridge client session.
///
/// Not meant for concurrent use: every exchange needs `&mut self`.
pub struct Client<T = StreamTransport> {
    transport: T,
    decoder: Decoder,
    state: SessionState,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect over the envelope stream transport with default settings.
    pub fn connect(endpoint: &str) -> Result<Self> {
        ClientBuilder::new().endpoint(endpoint).connect()
    }
}

impl<T: Transport> Client<T> {
    /// Wrap a transport with the default decoder.
    pub fn new(transport: T) -> Self {
        ClientBuilder::new().build(transport)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send the trigger request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Usage`] if the previous reply has not been
    /// received yet.
    pub fn send_request(&mut self) -> Result<()> {
        if self.state == SessionState::AwaitingReply {
            return Err(BridgeError::Usage(
                "cannot send a request while awaiting a reply",
            ));
        }
        self.transport.send_frame(TRIGGER)?;
        self.state = SessionState::AwaitingReply;
        Ok(())
    }

    /// Receive every frame of the pending reply.
    ///
    /// On a transport error the session stays in
    /// [`SessionState::AwaitingReply`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Usage`] if no request was sent.
    pub fn receive_reply(&mut self) -> Result<Vec<Bytes>> {
        if self.state == SessionState::Idle {
            return Err(BridgeError::Usage("no request in flight"));
        }

        let mut frames = Vec::new();
        loop {
            let frame = self.transport.receive_frame()?;
            frames.push(frame.data);
            if !frame.more {
                break;
            }
        }
        self.state = SessionState::Idle;

        tracing::debug!(
            "Received reply: {} frames, {} bytes",
            frames.len(),
            frames.iter().map(Bytes::len).sum::<usize>()
        );
        Ok(frames)
    }

    /// One full exchange, returning the raw frames.
    pub fn request(&mut self) -> Result<Vec<Bytes>> {
        self.send_request()?;
        self.receive_reply()
    }

    /// Request and decode the next reply.
    pub fn next_reply(&mut self) -> Result<Reply> {
        let frames = self.request()?;
        self.decoder.decode(frames)
    }

    /// Request the next reply and dump its raw frames.
    ///
    /// Consumes one reply from the server.
    pub fn show_msg(&mut self) -> Result<String> {
        let frames = self.request()?;
        Ok(render_frames(&frames))
    }

    /// Request the next reply and summarize its structure.
    ///
    /// Consumes one reply from the server.
    pub fn show_next(&mut self) -> Result<String> {
        let reply = self.next_reply()?;
        Ok(ReplySummary(&reply).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;
    use crate::transport::ReceivedFrame;
    use std::collections::{BTreeMap, VecDeque};

    /// Transport answering from a script of frames.
    #[derive(Default)]
    struct MockTransport {
        script: VecDeque<ReceivedFrame>,
        sent: Vec<Vec<u8>>,
    }

    impl MockTransport {
        fn with_reply(frames: Vec<Vec<u8>>) -> Self {
            let mut transport = Self::default();
            transport.queue(frames);
            transport
        }

        fn queue(&mut self, frames: Vec<Vec<u8>>) {
            let last = frames.len().saturating_sub(1);
            for (i, data) in frames.into_iter().enumerate() {
                self.script.push_back(ReceivedFrame {
                    data: Bytes::from(data),
                    more: i != last,
                });
            }
        }
    }

    impl Transport for MockTransport {
        fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
            self.sent.push(frame.to_vec());
            Ok(())
        }

        fn receive_frame(&mut self) -> Result<ReceivedFrame> {
            self.script.pop_front().ok_or(BridgeError::ConnectionClosed)
        }
    }

    fn xgm_reply(train_id: u64) -> Vec<Vec<u8>> {
        let mut header = BTreeMap::new();
        header.insert("source", "XGM");
        header.insert("content", "msgpack");
        let mut data = BTreeMap::new();
        data.insert("trainId", train_id);
        vec![
            MsgPackCodec::encode(&header).unwrap(),
            MsgPackCodec::encode(&data).unwrap(),
        ]
    }

    #[test]
    fn test_request_sends_trigger_and_collects_frames() {
        let mut client = Client::new(MockTransport::with_reply(xgm_reply(1)));
        assert_eq!(client.state(), SessionState::Idle);

        let frames = client.request().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(client.transport().sent, vec![b"next".to_vec()]);
    }

    #[test]
    fn test_send_twice_is_usage_error() {
        let mut client = Client::new(MockTransport::default());
        client.send_request().unwrap();
        assert_eq!(client.state(), SessionState::AwaitingReply);

        assert!(matches!(client.send_request(), Err(BridgeError::Usage(_))));
        assert_eq!(client.transport().sent.len(), 1);
    }

    #[test]
    fn test_receive_while_idle_is_usage_error() {
        let mut client = Client::new(MockTransport::with_reply(xgm_reply(1)));
        assert!(matches!(client.receive_reply(), Err(BridgeError::Usage(_))));
    }

    #[test]
    fn test_failed_receive_stays_awaiting() {
        let mut client = Client::new(MockTransport::default());
        assert!(matches!(client.request(), Err(BridgeError::ConnectionClosed)));
        assert_eq!(client.state(), SessionState::AwaitingReply);
        assert!(matches!(client.request(), Err(BridgeError::Usage(_))));
    }

    #[test]
    fn test_next_reply_decodes() {
        let mut transport = MockTransport::with_reply(xgm_reply(7));
        transport.queue(xgm_reply(8));
        let mut client = Client::new(transport);

        let first = client.next_reply().unwrap();
        assert_eq!(first["XGM"]["trainId"].cast::<u64>().unwrap(), 7);
        let second = client.next_reply().unwrap();
        assert_eq!(second["XGM"]["trainId"].cast::<u64>().unwrap(), 8);
        assert_eq!(client.transport().sent.len(), 2);
    }

    #[test]
    fn test_builder_source_policy_reaches_decoder() {
        let client = Client::builder()
            .source_policy(SourcePolicy::RequireMatch)
            .build(MockTransport::default());
        assert_eq!(client.decoder().source_policy(), SourcePolicy::RequireMatch);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder()
            .endpoint("tcp://exflong:1234")
            .max_frame_size(2048)
            .read_timeout(Duration::from_secs(2));

        assert_eq!(builder.config.endpoint, "tcp://exflong:1234");
        assert_eq!(builder.config.max_frame_size, 2048);
        assert_eq!(builder.config.read_timeout_ms, Some(2000));
    }

    #[test]
    fn test_sub_millisecond_timeout_is_not_zero() {
        for timeout in [Duration::ZERO, Duration::from_micros(300)] {
            let builder = Client::builder().read_timeout(timeout);
            assert_eq!(builder.config.read_timeout_ms, Some(1));
            assert_eq!(builder.config.read_timeout(), Some(Duration::from_millis(1)));
        }
    }

    #[test]
    fn test_show_msg_and_show_next() {
        let mut transport = MockTransport::with_reply(xgm_reply(3));
        transport.queue(xgm_reply(4));
        let mut client = Client::new(transport);

        let dump = client.show_msg().unwrap();
        assert_eq!(dump.matches("new message").count(), 2);
        assert!(dump.contains("\"trainId\": 3"));

        let summary = client.show_next().unwrap();
        assert!(summary.starts_with("source: XGM\n"));
        assert!(summary.contains("trainId, uint\n"));
    }
}
